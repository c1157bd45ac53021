//! Raw declarations of the private window-server (CGS) entry points and the
//! few public CoreGraphics / ApplicationServices calls the backend needs.
//!
//! The CGS symbols are undocumented; signatures follow what the window
//! server has accepted since macOS 10.11.

#![allow(non_snake_case)]

use core_foundation::array::CFArrayRef;
use core_foundation::base::CFAllocatorRef;
use core_foundation::string::CFStringRef;
use core_foundation::uuid::CFUUIDRef;

pub type CGSConnectionID = i32;
pub type CGSSpaceID = u64;
pub type CGWindowID = u32;
pub type CGDirectDisplayID = u32;
pub type CGError = i32;

pub const K_CG_ERROR_SUCCESS: CGError = 0;

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    pub fn CGSMainConnectionID() -> CGSConnectionID;

    pub fn CGSManagedDisplayGetCurrentSpace(cid: CGSConnectionID, display: CFStringRef) -> CGSSpaceID;

    /// Returns a +1 array of per-display dictionaries.
    pub fn CGSCopyManagedDisplaySpaces(cid: CGSConnectionID) -> CFArrayRef;

    /// Returns a +1 array of window-id numbers.
    pub fn CGSCopyWindowsWithOptionsAndTags(
        cid: CGSConnectionID,
        owner: u32,
        spaces: CFArrayRef,
        options: u32,
        set_tags: *mut u64,
        clear_tags: *mut u64,
    ) -> CFArrayRef;

    pub fn CGSGetWindowLevel(cid: CGSConnectionID, wid: CGWindowID, level: *mut i32) -> CGError;

    /// Returns a +1 array of space-id numbers.
    pub fn CGSCopySpacesForWindows(cid: CGSConnectionID, mask: u32, windows: CFArrayRef) -> CFArrayRef;

    pub fn CGSSpaceGetType(cid: CGSConnectionID, sid: CGSSpaceID) -> i32;

    pub fn CGSAddWindowsToSpaces(cid: CGSConnectionID, windows: CFArrayRef, spaces: CFArrayRef);

    pub fn CGSRemoveWindowsFromSpaces(cid: CGSConnectionID, windows: CFArrayRef, spaces: CFArrayRef);

    pub fn CGSMoveWindowsToManagedSpace(cid: CGSConnectionID, windows: CFArrayRef, sid: CGSSpaceID);

    pub fn CGMainDisplayID() -> CGDirectDisplayID;
}

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    /// Returns a +1 UUID, or null for an unknown display.
    pub fn CGDisplayCreateUUIDFromDisplayID(display: CGDirectDisplayID) -> CFUUIDRef;

    pub fn AXIsProcessTrusted() -> bool;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    pub fn CFUUIDCreateString(alloc: CFAllocatorRef, uuid: CFUUIDRef) -> CFStringRef;
}
