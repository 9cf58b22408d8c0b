use crate::platform::{Error, KnownFolder, Platform};
use crate::wide::WideString;
use std::ffi::{c_void, OsString};
use std::os::windows::ffi::OsStringExt;
use std::path::{Path, PathBuf};
use windows::core::{GUID, PCWSTR, PWSTR};
use windows::Win32::Foundation::{
    CloseHandle, LocalFree, ERROR_NOT_ALL_ASSIGNED, ERROR_NO_MORE_FILES, HANDLE, HLOCAL, LUID,
    MAX_PATH,
};
use windows::Win32::Security::Authorization::{
    GetNamedSecurityInfoW, SetEntriesInAclW, SetNamedSecurityInfoW, EXPLICIT_ACCESS_W,
    NO_MULTIPLE_TRUSTEE, SET_ACCESS, SE_FILE_OBJECT, TRUSTEE_IS_SID,
    TRUSTEE_IS_WELL_KNOWN_GROUP, TRUSTEE_W,
};
use windows::Win32::Security::{
    AdjustTokenPrivileges, CreateWellKnownSid, DuplicateToken, LookupPrivilegeValueW,
    SecurityImpersonation, WinBuiltinAdministratorsSid, ACL, DACL_SECURITY_INFORMATION,
    LUID_AND_ATTRIBUTES, PSECURITY_DESCRIPTOR, PSID, SECURITY_MAX_SID_SIZE,
    SE_PRIVILEGE_ENABLED, SUB_CONTAINERS_AND_OBJECTS_INHERIT, TOKEN_ADJUST_PRIVILEGES,
    TOKEN_DUPLICATE, TOKEN_IMPERSONATE, TOKEN_PRIVILEGES, TOKEN_PRIVILEGES_ATTRIBUTES,
    TOKEN_QUERY, TOKEN_READ,
};
use windows::Win32::System::Com::CoTaskMemFree;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    GetCurrentProcess, OpenProcess, OpenProcessToken, QueryFullProcessImageNameW,
    PROCESS_NAME_WIN32, PROCESS_QUERY_INFORMATION,
};
use windows::Win32::UI::Shell::{
    SHGetKnownFolderPath, FOLDERID_LocalAppData, FOLDERID_Profile, FOLDERID_ProgramData,
    FOLDERID_RoamingAppData, FOLDERID_System, FOLDERID_UserProfiles, KF_FLAG_DEFAULT,
};

const DEBUG_PRIVILEGE: &str = "SeDebugPrivilege";

// GENERIC_ALL
const FULL_CONTROL: u32 = 0x1000_0000;

/// Closes the wrapped handle when dropped
#[derive(Debug)]
pub struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if let Err(e) = unsafe { CloseHandle(self.0) } {
            log::warn!("Failed to close handle: {}", e);
        }
    }
}

/// A duplicated access token of another process
#[derive(Debug)]
pub struct ProcessIdentity {
    token: OwnedHandle,
}

/// Keeps a privilege enabled on the current process until dropped
struct PrivilegeGuard {
    name: &'static str,
}

impl PrivilegeGuard {
    fn enable(name: &'static str) -> Result<Self, Error> {
        set_privilege(name, true).map_err(|e| Error::Privilege(name, e.into()))?;
        log::debug!("Enabled {}", name);
        Ok(Self { name })
    }
}

impl Drop for PrivilegeGuard {
    fn drop(&mut self) {
        match set_privilege(self.name, false) {
            Ok(_) => log::debug!("Disabled {}", self.name),
            Err(e) => log::warn!("Failed to disable {}: {}", self.name, e),
        }
    }
}

fn set_privilege(name: &str, enable: bool) -> windows::core::Result<()> {
    unsafe {
        let mut token = HANDLE::default();
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut token,
        )?;
        let token = OwnedHandle(token);

        let name = name.to_wide();
        let mut luid = LUID::default();
        LookupPrivilegeValueW(PCWSTR::null(), PCWSTR(name.as_ptr()), &mut luid)?;

        let privileges = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: luid,
                Attributes: if enable {
                    SE_PRIVILEGE_ENABLED
                } else {
                    TOKEN_PRIVILEGES_ATTRIBUTES(0)
                },
            }],
        };
        AdjustTokenPrivileges(
            token.0,
            false,
            Some(&privileges as *const _),
            0,
            None,
            None,
        )?;

        // Succeeds even when the privilege is not held
        let error = windows::core::Error::from_win32();
        if error.code() == ERROR_NOT_ALL_ASSIGNED.to_hresult() {
            return Err(error);
        }
    }
    Ok(())
}

fn folder_id(folder: KnownFolder) -> &'static GUID {
    match folder {
        KnownFolder::LocalAppData => &FOLDERID_LocalAppData,
        KnownFolder::RoamingAppData => &FOLDERID_RoamingAppData,
        KnownFolder::Profile => &FOLDERID_Profile,
        KnownFolder::UserProfiles => &FOLDERID_UserProfiles,
        KnownFolder::ProgramData => &FOLDERID_ProgramData,
        KnownFolder::System => &FOLDERID_System,
    }
}

fn known_folder_path(folder: KnownFolder, token: HANDLE) -> windows::core::Result<PathBuf> {
    unsafe {
        let raw = SHGetKnownFolderPath(folder_id(folder), KF_FLAG_DEFAULT, token)?;
        let path = OsString::from_wide(raw.as_wide());
        CoTaskMemFree(Some(raw.0 as *const c_void));
        Ok(PathBuf::from(path))
    }
}

fn exe_name(entry: &PROCESSENTRY32W) -> String {
    let len = entry
        .szExeFile
        .iter()
        .position(|c| *c == 0)
        .unwrap_or(entry.szExeFile.len());
    String::from_utf16_lossy(&entry.szExeFile[..len])
}

fn process_ids_named(name: &str) -> windows::core::Result<Vec<u32>> {
    let mut ids = vec![];
    unsafe {
        let snapshot = OwnedHandle(CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)?);
        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };
        let mut next = Process32FirstW(snapshot.0, &mut entry);
        loop {
            match next {
                Ok(()) => {}
                Err(e) if e.code() == ERROR_NO_MORE_FILES.to_hresult() => break,
                Err(e) => return Err(e),
            }
            if exe_name(&entry).eq_ignore_ascii_case(name) {
                ids.push(entry.th32ProcessID);
            }
            next = Process32NextW(snapshot.0, &mut entry);
        }
    }
    Ok(ids)
}

fn image_path(process: &OwnedHandle) -> windows::core::Result<PathBuf> {
    let mut buffer = vec![0u16; MAX_PATH as usize * 4];
    let mut len = buffer.len() as u32;
    unsafe {
        QueryFullProcessImageNameW(
            process.0,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut len,
        )?;
    }
    Ok(PathBuf::from(OsString::from_wide(&buffer[..len as usize])))
}

/// Opens the process named `name` that runs from the system directory, so a user process that
/// happens to share the name is never picked up
fn open_system_process(name: &str) -> Result<OwnedHandle, Error> {
    let expected = known_folder_path(KnownFolder::System, HANDLE::default())
        .map_err(|e| Error::KnownFolder(KnownFolder::System, e.into()))?
        .join(name);
    let candidates = process_ids_named(name).map_err(|e| Error::ProcessList(e.into()))?;
    let mut last_error = None;
    for pid in candidates {
        let process = match unsafe { OpenProcess(PROCESS_QUERY_INFORMATION, false, pid) } {
            Ok(h) => OwnedHandle(h),
            Err(e) => {
                log::debug!("Unable to open process {} ({}): {}", pid, name, e);
                last_error = Some(e);
                continue;
            }
        };
        match image_path(&process) {
            Ok(path) if path_eq(&path, &expected) => return Ok(process),
            Ok(path) => log::debug!("Ignoring {} ({}) at {}", name, pid, path.display()),
            Err(e) => log::debug!("Unable to query image of process {}: {}", pid, e),
        }
    }
    Err(match last_error {
        Some(e) => Error::OpenProcess(name.to_owned(), e.into()),
        None => Error::ProcessNotFound(name.to_owned()),
    })
}

fn path_eq(lhs: &Path, rhs: &Path) -> bool {
    lhs.to_string_lossy().to_lowercase() == rhs.to_string_lossy().to_lowercase()
}

#[derive(Debug, Default)]
pub struct WindowsPlatform;

impl Platform for WindowsPlatform {
    type Identity = ProcessIdentity;

    fn known_folder(
        &self,
        folder: KnownFolder,
        identity: Option<&Self::Identity>,
    ) -> Result<PathBuf, Error> {
        let token = identity.map(|i| i.token.0).unwrap_or_default();
        known_folder_path(folder, token).map_err(|e| Error::KnownFolder(folder, e.into()))
    }

    fn acquire_identity(&self, process_name: &str) -> Result<Self::Identity, Error> {
        let _debug = PrivilegeGuard::enable(DEBUG_PRIVILEGE)?;

        let process = open_system_process(process_name)?;
        let token_error =
            |e: windows::core::Error| Error::ProcessToken(process_name.to_owned(), e.into());

        let token = unsafe {
            let mut token = HANDLE::default();
            OpenProcessToken(
                process.0,
                TOKEN_READ | TOKEN_IMPERSONATE | TOKEN_DUPLICATE,
                &mut token,
            )
            .map_err(token_error)?;
            OwnedHandle(token)
        };
        drop(process);

        let duplicate = unsafe {
            let mut duplicate = HANDLE::default();
            DuplicateToken(token.0, SecurityImpersonation, &mut duplicate).map_err(token_error)?;
            OwnedHandle(duplicate)
        };
        log::debug!("Acquired identity of {}", process_name);
        Ok(ProcessIdentity { token: duplicate })
    }

    fn grant_admin_access(&self, path: &Path) -> Result<(), Error> {
        add_admin_to_dacl(path).map_err(|e| Error::GrantAccess(path.to_path_buf(), e.into()))
    }
}

fn add_admin_to_dacl(path: &Path) -> windows::core::Result<()> {
    let name = path.to_wide();
    let mut sid_buffer = vec![0u8; SECURITY_MAX_SID_SIZE as usize];
    let mut sid_size = sid_buffer.len() as u32;
    unsafe {
        let sid = PSID(sid_buffer.as_mut_ptr() as *mut c_void);
        CreateWellKnownSid(WinBuiltinAdministratorsSid, PSID::default(), sid, &mut sid_size)?;

        let mut old_dacl: *mut ACL = std::ptr::null_mut();
        let mut descriptor = PSECURITY_DESCRIPTOR::default();
        GetNamedSecurityInfoW(
            PCWSTR(name.as_ptr()),
            SE_FILE_OBJECT,
            DACL_SECURITY_INFORMATION,
            None,
            None,
            Some(&mut old_dacl as *mut _),
            None,
            &mut descriptor,
        )
        .ok()?;
        let _descriptor = LocalMemory(descriptor.0);

        let access = EXPLICIT_ACCESS_W {
            grfAccessPermissions: FULL_CONTROL,
            grfAccessMode: SET_ACCESS,
            grfInheritance: SUB_CONTAINERS_AND_OBJECTS_INHERIT,
            Trustee: TRUSTEE_W {
                pMultipleTrustee: std::ptr::null_mut(),
                MultipleTrusteeOperation: NO_MULTIPLE_TRUSTEE,
                TrusteeForm: TRUSTEE_IS_SID,
                TrusteeType: TRUSTEE_IS_WELL_KNOWN_GROUP,
                ptstrName: PWSTR(sid.0 as *mut u16),
            },
        };
        let mut new_dacl: *mut ACL = std::ptr::null_mut();
        SetEntriesInAclW(
            Some(std::slice::from_ref(&access)),
            Some(old_dacl as *const ACL),
            &mut new_dacl,
        )
        .ok()?;
        let _new_dacl = LocalMemory(new_dacl as *mut c_void);

        SetNamedSecurityInfoW(
            PCWSTR(name.as_ptr()),
            SE_FILE_OBJECT,
            DACL_SECURITY_INFORMATION,
            PSID::default(),
            PSID::default(),
            Some(new_dacl as *const ACL),
            None,
        )
        .ok()?;
    }
    log::debug!("Granted administrators full control of {}", path.display());
    Ok(())
}

/// Memory returned by the security APIs, released with `LocalFree`
struct LocalMemory(*mut c_void);

impl Drop for LocalMemory {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                let _ = LocalFree(HLOCAL(self.0 as _));
            }
        }
    }
}
