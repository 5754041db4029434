use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::{c_char, c_void};

use parking_lot::Mutex;

use crate::core::error::{Error, ErrorKind, Result};

struct LoadedLibrary {
    handle: *mut c_void,
    ref_count: usize,
}

unsafe impl Send for LoadedLibrary {}

/// Ref-counted, name-keyed loader over `dlopen`/`dlsym` (spec §4.12). Load
/// is globally serialized with a mutex to avoid deadlocks with
/// constructor code in the loaded library that itself tries to acquire
/// this same loader.
pub struct DriverLoader {
    libraries: Mutex<HashMap<String, LoadedLibrary>>,
}

impl Default for DriverLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverLoader {
    pub fn new() -> Self {
        DriverLoader { libraries: Mutex::new(HashMap::new()) }
    }

    /// Normalizes `name` to the platform's shared-library naming
    /// convention (`lib<name>.so` on Linux).
    fn normalize(name: &str) -> String {
        if name.starts_with("lib") && name.ends_with(".so") {
            name.to_string()
        } else {
            format!("lib{}.so", name)
        }
    }

    pub fn load(&self, name: &str) -> Result<()> {
        let key = Self::normalize(name);
        let mut libs = self.libraries.lock();
        if let Some(lib) = libs.get_mut(&key) {
            lib.ref_count += 1;
            return Ok(());
        }
        let c_path = CString::new(key.clone())
            .map_err(|e| Error::new(ErrorKind::BadArgument, format!("invalid library name: {}", e)))?;
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW) };
        if handle.is_null() {
            return Err(Error::new(ErrorKind::LibraryNotFound, key));
        }
        libs.insert(key, LoadedLibrary { handle, ref_count: 1 });
        Ok(())
    }

    pub fn unload(&self, name: &str) -> Result<()> {
        let key = Self::normalize(name);
        let mut libs = self.libraries.lock();
        if let Some(lib) = libs.get_mut(&key) {
            lib.ref_count -= 1;
            if lib.ref_count == 0 {
                let lib = libs.remove(&key).unwrap();
                unsafe {
                    libc::dlclose(lib.handle);
                }
            }
        }
        Ok(())
    }

    /// Resolves `symbol` in `name`, which must already be loaded.
    pub fn get_function(&self, name: &str, symbol: &str) -> Result<*mut c_void> {
        let key = Self::normalize(name);
        let libs = self.libraries.lock();
        let lib = libs.get(&key).ok_or_else(|| Error::new(ErrorKind::LibraryNotFound, key.clone()))?;
        let c_symbol: CString = CString::new(symbol)
            .map_err(|e| Error::new(ErrorKind::BadArgument, format!("invalid symbol name: {}", e)))?;
        let sym = unsafe { libc::dlsym(lib.handle, c_symbol.as_ptr() as *const c_char) };
        if sym.is_null() {
            return Err(Error::new(ErrorKind::SymbolNotFound, symbol.to_string()));
        }
        Ok(sym)
    }
}

impl Drop for DriverLoader {
    fn drop(&mut self) {
        let mut libs = self.libraries.lock();
        for (_, lib) in libs.drain() {
            unsafe {
                libc::dlclose(lib.handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_library_is_library_not_found() {
        let loader = DriverLoader::new();
        let err = loader.load("definitely_not_a_real_library_xyz").unwrap_err();
        assert_eq!(err.kind, ErrorKind::LibraryNotFound);
    }
}
