//! The C ABI used by host simulators.
//! Every pointer handed out by a constructor must be released with `cache_close`.
use libc::c_char;
use std::{ffi::CStr, ptr, slice};

use crate::{
    cache::{AccessKind, AccessResult, Cache, FillResult},
    config::{CacheConfig, ReplacementPolicy},
    init_tracing,
    trace::{MemoryHierarchy, TraceDriver},
};

unsafe fn c_str<'a>(raw: *const c_char) -> Option<&'a str> {
    if raw.is_null() {
        return None;
    }
    CStr::from_ptr(raw).to_str().ok()
}

fn into_raw(config: CacheConfig) -> *mut Cache {
    match Cache::new(config) {
        Ok(cache) => Box::into_raw(Box::new(cache)),
        Err(e) => {
            tracing::error!("cannot create cache: {e}");
            ptr::null_mut()
        }
    }
}

/// create a cache, null when the configuration is rejected
/// # Safety
/// `name` must be null or a valid nul terminated string
#[no_mangle]
pub unsafe extern "C" fn cache_new(
    name: *const c_char,
    num_sets: usize,
    block_size: usize,
    associativity: usize,
    policy: ReplacementPolicy,
    hit_latency: u64,
    miss_latency: u64,
) -> *mut Cache {
    init_tracing();
    let Some(name) = c_str(name) else {
        tracing::error!("cache name is null or not utf-8");
        return ptr::null_mut();
    };
    into_raw(CacheConfig::new(
        name,
        num_sets,
        block_size,
        associativity,
        policy,
        hit_latency,
        miss_latency,
    ))
}

/// # Safety
/// `path` must be null or a valid nul terminated string
#[no_mangle]
pub unsafe extern "C" fn cache_from_config_file(path: *const c_char) -> *mut Cache {
    init_tracing();
    let Some(path) = c_str(path) else {
        tracing::error!("config path is null or not utf-8");
        return ptr::null_mut();
    };
    match CacheConfig::from_config_file(path) {
        Ok(config) => into_raw(config),
        Err(e) => {
            tracing::error!("cannot load cache config {path}: {e:?}");
            ptr::null_mut()
        }
    }
}

/// returns the latency, 0 for a null cache
/// # Safety
/// `cache` must come from a constructor of this module and not be closed
#[no_mangle]
pub unsafe extern "C" fn cache_access(
    cur_cycle: u64,
    cache: *mut Cache,
    kind: AccessKind,
    addr: u64,
) -> u64 {
    match cache.as_mut() {
        Some(cache) => cache.access(cur_cycle, kind, addr),
        None => {
            tracing::error!("cache_access on a null cache");
            0
        }
    }
}

/// 0 on a hit, 1 on a miss, -1 when the transfer is rejected
/// # Safety
/// `cache` as for `cache_access`, `data` must point to `size` writable bytes
#[no_mangle]
pub unsafe extern "C" fn cache_access_data(
    cur_cycle: u64,
    cache: *mut Cache,
    kind: AccessKind,
    addr: u64,
    data: *mut u8,
    size: usize,
) -> i32 {
    let Some(cache) = cache.as_mut() else {
        tracing::error!("cache_access_data on a null cache");
        return -1;
    };
    if data.is_null() && size != 0 {
        tracing::error!("cache_access_data with a null buffer");
        return -1;
    }
    let buffer: &mut [u8] = if size == 0 {
        &mut []
    } else {
        slice::from_raw_parts_mut(data, size)
    };
    match cache.access_with_data(cur_cycle, kind, addr, buffer) {
        Ok(AccessResult::Hit(_)) => 0,
        Ok(AccessResult::Miss(_)) => 1,
        Err(_) => -1,
    }
}

/// 1 when the line was resident, 0 when not, -1 on a null argument
/// # Safety
/// `cache` as for `cache_access`, `data` must point to one block of readable bytes
#[no_mangle]
pub unsafe extern "C" fn cache_update_data(
    cur_cycle: u64,
    cache: *mut Cache,
    addr: u64,
    data: *const u8,
) -> i32 {
    let Some(cache) = cache.as_mut() else {
        tracing::error!("cache_update_data on a null cache");
        return -1;
    };
    if data.is_null() {
        tracing::error!("cache_update_data with a null buffer");
        return -1;
    }
    let buffer = slice::from_raw_parts(data, cache.config().block_size);
    match cache.force_update(cur_cycle, addr, buffer) {
        Ok(FillResult::Found) => 1,
        Ok(FillResult::NotFound) => 0,
        Err(_) => -1,
    }
}

/// # Safety
/// `cache` as for `cache_access`
#[no_mangle]
pub unsafe extern "C" fn cache_invalidate_data(cache: *mut Cache) {
    if let Some(cache) = cache.as_mut() {
        cache.invalidate_all();
    }
}

/// # Safety
/// `cache` as for `cache_access`
#[no_mangle]
pub unsafe extern "C" fn cache_print(cache: *const Cache) {
    if let Some(cache) = cache.as_ref() {
        print!("{}", cache.report());
    }
}

/// run a trace file through two chained caches, 0 on success and -1 on failure
/// # Safety
/// both caches as for `cache_access` and distinct, `filename` as for `cache_from_config_file`
#[no_mangle]
pub unsafe extern "C" fn mcache_read_trace_file(
    l1: *mut Cache,
    l2: *mut Cache,
    filename: *const c_char,
) -> i32 {
    let (Some(l1), Some(l2), Some(filename)) = (l1.as_mut(), l2.as_mut(), c_str(filename)) else {
        tracing::error!("mcache_read_trace_file with a null argument");
        return -1;
    };
    let result = TraceDriver::from_file(filename, MemoryHierarchy::new(l1, l2))
        .and_then(|driver| driver.run());
    match result {
        Ok(_) => 0,
        Err(e) => {
            tracing::error!("trace {filename} failed: {e:?}");
            -1
        }
    }
}

/// release the cache and every block it owns
/// # Safety
/// `cache` must come from a constructor of this module, it is dangling afterwards
#[no_mangle]
pub unsafe extern "C" fn cache_close(cache: *mut Cache) {
    if !cache.is_null() {
        let report = Box::from_raw(cache).close();
        tracing::debug!(cache = %report.name, "cache closed");
    }
}
