use duckdb::vtab::BindInfo;
use libduckdb_sys::{
    duckdb_bind_get_named_parameter, duckdb_bind_info, duckdb_destroy_value, duckdb_free,
    duckdb_get_int64, duckdb_get_varchar, duckdb_is_null_value, duckdb_value,
};
use std::ffi::{CStr, CString};
use std::os::raw::c_void;

#[derive(Debug, Eq, PartialEq)]
pub(crate) enum NamedParameter<T> {
    Missing,
    Null,
    Value(T),
}

impl<T> NamedParameter<T> {
    pub(crate) fn into_option(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Missing | Self::Null => None,
        }
    }
}

/// Looks up a named parameter and hands the non-NULL value to `read`.
fn get_named_parameter<T>(
    bind: &BindInfo,
    name: &str,
    read: impl FnOnce(duckdb_value) -> Result<T, Box<dyn std::error::Error>>,
) -> Result<NamedParameter<T>, Box<dyn std::error::Error>> {
    let name_cstr = CString::new(name)?;

    // SAFETY: The returned pointer is owned by DuckDB and valid only for this bind callback.
    let mut value =
        unsafe { duckdb_bind_get_named_parameter(bind_info_ptr(bind), name_cstr.as_ptr()) };
    if value.is_null() {
        return Ok(NamedParameter::Missing);
    }

    // SAFETY: `value` is a valid `duckdb_value` handle returned by DuckDB.
    let result = if unsafe { duckdb_is_null_value(value) } {
        Ok(NamedParameter::Null)
    } else {
        read(value).map(NamedParameter::Value)
    };

    // SAFETY: `value` has not been destroyed yet and must be released once.
    unsafe {
        duckdb_destroy_value(&mut value);
    }

    result
}

pub(crate) fn get_named_parameter_varchar(
    bind: &BindInfo,
    name: &str,
) -> Result<NamedParameter<String>, Box<dyn std::error::Error>> {
    get_named_parameter(bind, name, |value| {
        // SAFETY: `value` is a live non-NULL handle for the duration of this call.
        unsafe {
            let varchar = duckdb_get_varchar(value);
            if varchar.is_null() {
                return Err(format!("Failed to read named parameter '{}' as VARCHAR", name).into());
            }
            let text = CStr::from_ptr(varchar).to_string_lossy().into_owned();
            duckdb_free(varchar as *mut c_void);
            Ok(text)
        }
    })
}

pub(crate) fn get_named_parameter_bigint(
    bind: &BindInfo,
    name: &str,
) -> Result<NamedParameter<i64>, Box<dyn std::error::Error>> {
    // SAFETY: `value` is a live non-NULL handle declared as BIGINT in `named_parameters`.
    get_named_parameter(bind, name, |value| Ok(unsafe { duckdb_get_int64(value) }))
}

fn bind_info_ptr(bind: &BindInfo) -> duckdb_bind_info {
    // SAFETY: duckdb-rs stores `duckdb_bind_info` as the only field inside
    // `duckdb::vtab::BindInfo`, and exposes no null-aware named-parameter accessor.
    // Re-validate the layout in duckdb-rs `src/vtab/function.rs` on upgrades.
    unsafe { *(bind as *const BindInfo as *const duckdb_bind_info) }
}
