use std::ffi::OsStr;
use std::iter::once;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;

/// Null terminated UTF-16, as expected by the wide Win32 functions
pub trait WideString {
    fn to_wide(&self) -> Vec<u16>;
}

impl WideString for str {
    fn to_wide(&self) -> Vec<u16> {
        OsStr::new(self).encode_wide().chain(once(0)).collect()
    }
}

impl WideString for Path {
    fn to_wide(&self) -> Vec<u16> {
        self.as_os_str().encode_wide().chain(once(0)).collect()
    }
}
