//! Raw FFI bindings for the Tucsen TUCAM SDK.
//!
//! Bindings are generated by `build.rs` with bindgen when the `tucam-sdk`
//! feature is enabled. Without the feature the crate is empty so that
//! dependents still build on machines without the SDK.
//!
//! # Safety
//!
//! Every function here is a raw `unsafe` FFI call. The `dhyana-camera` crate
//! wraps them behind its `tucam_hardware` feature.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]
#![allow(clippy::all)]

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
