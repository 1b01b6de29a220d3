// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! PLI types and constants for C FFI, from `vpi_user.h` and `acc_user.h`
//! (IEEE 1364).

#![allow(non_camel_case_types, non_upper_case_globals)]

use libc::{c_char, c_double, c_int, c_uint, c_void};

pub type PLI_INT32 = c_int;
pub type PLI_UINT32 = c_uint;
pub type PLI_BYTE8 = c_char;

/// An opaque VPI object reference.
pub type vpiHandle = *mut c_void;

/// An opaque ACC object reference.
pub type acc_handle = *mut c_void;

/// `s_vpi_value.format`: integer value.
pub const vpiIntVal: PLI_INT32 = 6;

/// `vpi_put_value` flag: force the value until released.
pub const vpiForceFlag: PLI_INT32 = 5;

/// `vpi_put_value` flag: release a previous force.
pub const vpiReleaseFlag: PLI_INT32 = 6;

#[repr(C)]
#[derive(Clone, Copy)]
pub union t_vpi_value_value {
    pub str_: *mut PLI_BYTE8,
    pub scalar: PLI_INT32,
    pub integer: PLI_INT32,
    pub real: c_double,
    pub time: *mut c_void,
    pub vector: *mut c_void,
    pub strength: *mut c_void,
    pub misc: *mut PLI_BYTE8,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct s_vpi_value {
    pub format: PLI_INT32,
    pub value: t_vpi_value_value,
}

impl s_vpi_value {
    pub fn integer(value: PLI_INT32) -> Self {
        Self {
            format: vpiIntVal,
            value: t_vpi_value_value { integer: value },
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct s_vpi_time {
    pub type_: PLI_INT32,
    pub high: PLI_UINT32,
    pub low: PLI_UINT32,
    pub real: c_double,
}

/// `s_setval_value.format` / `s_acc_value.format`: integer value.
pub const accIntVal: c_int = 6;

/// `s_acc_time.type`: simulation time in low/high words.
pub const accSimTime: c_int = 2;

/// `s_setval_delay.model`: force the value until released.
pub const accForceFlag: c_int = 4;

/// `s_setval_delay.model`: release a previous force.
pub const accReleaseFlag: c_int = 5;

#[repr(C)]
#[derive(Clone, Copy)]
pub union t_acc_value_value {
    pub str_: *mut c_char,
    pub scalar: c_int,
    pub integer: c_int,
    pub real: c_double,
    pub vector: *mut c_void,
}

/// Layout shared by `s_setval_value` and `s_acc_value`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct s_acc_value {
    pub format: c_int,
    pub value: t_acc_value_value,
}

pub type s_setval_value = s_acc_value;

impl s_acc_value {
    pub fn integer(value: c_int) -> Self {
        Self {
            format: accIntVal,
            value: t_acc_value_value { integer: value },
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct s_acc_time {
    pub type_: c_int,
    pub low: c_int,
    pub high: c_int,
    pub real: c_double,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct s_setval_delay {
    pub time: s_acc_time,
    pub model: c_int,
}

impl s_setval_delay {
    /// Zero delay with the given `model` flag.
    pub fn immediate(model: c_int) -> Self {
        Self {
            time: s_acc_time {
                type_: accSimTime,
                low: 0,
                high: 0,
                real: 0.0,
            },
            model,
        }
    }
}

pub type vpi_handle_by_name_t =
    unsafe extern "C" fn(*mut PLI_BYTE8, vpiHandle) -> vpiHandle;
pub type vpi_get_value_t = unsafe extern "C" fn(vpiHandle, *mut s_vpi_value);
pub type vpi_put_value_t = unsafe extern "C" fn(
    vpiHandle,
    *mut s_vpi_value,
    *mut s_vpi_time,
    PLI_INT32,
) -> vpiHandle;
pub type vpi_release_handle_t = unsafe extern "C" fn(vpiHandle) -> PLI_INT32;
pub type vpi_printf_t =
    unsafe extern "C" fn(*const PLI_BYTE8, ...) -> PLI_INT32;

pub type acc_initialize_t = unsafe extern "C" fn() -> c_int;
pub type acc_close_t = unsafe extern "C" fn();
pub type acc_handle_by_name_t =
    unsafe extern "C" fn(*const c_char, acc_handle) -> acc_handle;
pub type acc_fetch_value_t = unsafe extern "C" fn(
    acc_handle,
    *const c_char,
    *mut s_acc_value,
) -> *mut c_char;
pub type acc_set_value_t = unsafe extern "C" fn(
    acc_handle,
    *mut s_setval_value,
    *mut s_setval_delay,
) -> c_int;
pub type io_printf_t = unsafe extern "C" fn(*const c_char, ...);
