//! [`WindowServer`] implementation backed by the SkyLight (CGS) connection.
//!
//! The connection id is obtained once in [`SkyLightServer::new`] and reused
//! for every call.  Everything returned by the window server is converted
//! into the crate's typed vocabulary here; malformed replies become
//! [`SkyLightError`]s rather than panics.

use super::ffi;
use crate::command::{
    CopyWindowsOptions, DisplaySpaces, ScreenUuid, SpaceId, SpaceMask, SpaceType, WindowId,
};
use crate::traits::WindowServer;
use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{kCFAllocatorDefault, CFRelease, CFType, TCFType};
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use log::debug;

/// SkyLight-backed window server.
pub struct SkyLightServer {
    cid: ffi::CGSConnectionID,
}

/// Errors that can occur when talking to the window server.
#[derive(Debug, thiserror::Error)]
#[error("window server error: {0}")]
pub struct SkyLightError(String);

impl Default for SkyLightServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SkyLightServer {
    /// Open (or reuse) the process's main window-server connection.
    pub fn new() -> Self {
        let cid = unsafe { ffi::CGSMainConnectionID() };
        debug!("window server connection {}", cid);
        Self { cid }
    }
}

//  CoreFoundation helpers

type CFPlist = CFDictionary<CFString, CFType>;

/// Take ownership of a +1 array returned by a `Copy` call.
fn owned_array(raw: CFArrayRef, what: &str) -> Result<CFArray<CFType>, SkyLightError> {
    if raw.is_null() {
        return Err(SkyLightError(format!("{} returned null", what)));
    }
    Ok(unsafe { CFArray::wrap_under_create_rule(raw) })
}

fn number_array<I: IntoIterator<Item = i64>>(values: I) -> CFArray<CFNumber> {
    let numbers: Vec<CFNumber> = values.into_iter().map(CFNumber::from).collect();
    CFArray::from_CFTypes(&numbers)
}

fn space_array(spaces: &[SpaceId]) -> CFArray<CFNumber> {
    number_array(spaces.iter().map(|s| s.0 as i64))
}

fn window_array(windows: &[WindowId]) -> CFArray<CFNumber> {
    number_array(windows.iter().map(|w| i64::from(w.0)))
}

fn as_i64(value: &CFType) -> Option<i64> {
    value.downcast::<CFNumber>()?.to_i64()
}

fn as_plist(value: &CFType) -> Option<CFPlist> {
    let dict = value.downcast::<CFDictionary>()?;
    Some(unsafe { CFPlist::wrap_under_get_rule(dict.as_concrete_TypeRef()) })
}

fn lookup(dict: &CFPlist, key: &'static str) -> Result<CFType, SkyLightError> {
    dict.find(&CFString::from_static_string(key))
        .map(|v| (*v).clone())
        .ok_or_else(|| SkyLightError(format!("missing key {:?}", key)))
}

/// The `"id64"` of a space dictionary.
fn space_id(value: &CFType) -> Result<SpaceId, SkyLightError> {
    let dict = as_plist(value).ok_or_else(|| SkyLightError("space is not a dictionary".into()))?;
    let id = lookup(&dict, "id64")?;
    as_i64(&id)
        .map(|n| SpaceId(n as u64))
        .ok_or_else(|| SkyLightError("id64 is not a number".into()))
}

fn parse_display(value: &CFType) -> Result<DisplaySpaces, SkyLightError> {
    let dict =
        as_plist(value).ok_or_else(|| SkyLightError("display is not a dictionary".into()))?;

    let identifier = lookup(&dict, "Display Identifier")?
        .downcast::<CFString>()
        .ok_or_else(|| SkyLightError("display identifier is not a string".into()))?;

    let spaces = lookup(&dict, "Spaces")?
        .downcast::<CFArray>()
        .ok_or_else(|| SkyLightError("spaces is not an array".into()))?;
    let spaces = spaces
        .iter()
        .map(|raw| space_id(&unsafe { CFType::wrap_under_get_rule(*raw) }))
        .collect::<Result<Vec<_>, _>>()?;

    let current_space = space_id(&lookup(&dict, "Current Space")?)?;

    Ok(DisplaySpaces {
        display_identifier: ScreenUuid::new(identifier.to_string()),
        spaces,
        current_space,
    })
}

//  WindowServer implementation

impl WindowServer for SkyLightServer {
    type Error = SkyLightError;

    fn main_screen_uuid(&self) -> Result<Option<ScreenUuid>, Self::Error> {
        unsafe {
            let display = ffi::CGMainDisplayID();
            // Can be null even though the header says otherwise.
            let uuid = ffi::CGDisplayCreateUUIDFromDisplayID(display);
            if uuid.is_null() {
                return Ok(None);
            }
            let string = ffi::CFUUIDCreateString(kCFAllocatorDefault, uuid);
            CFRelease(uuid.cast());
            if string.is_null() {
                return Ok(None);
            }
            Ok(Some(ScreenUuid::new(
                CFString::wrap_under_create_rule(string).to_string(),
            )))
        }
    }

    fn current_space(&self, screen: &ScreenUuid) -> Result<SpaceId, Self::Error> {
        let display = CFString::new(screen.as_str());
        let space = unsafe {
            ffi::CGSManagedDisplayGetCurrentSpace(self.cid, display.as_concrete_TypeRef())
        };
        if space == 0 {
            return Err(SkyLightError(format!("no current space for display {}", screen)));
        }
        Ok(SpaceId(space))
    }

    fn managed_display_spaces(&self) -> Result<Vec<DisplaySpaces>, Self::Error> {
        let raw = unsafe { ffi::CGSCopyManagedDisplaySpaces(self.cid) };
        let displays = owned_array(raw, "CGSCopyManagedDisplaySpaces")?;
        displays.iter().map(|d| parse_display(&d)).collect()
    }

    fn windows_in_spaces(
        &self,
        spaces: &[SpaceId],
        options: CopyWindowsOptions,
    ) -> Result<Vec<WindowId>, Self::Error> {
        let spaces = space_array(spaces);
        let mut set_tags = 0u64;
        let mut clear_tags = 0u64;
        let raw = unsafe {
            ffi::CGSCopyWindowsWithOptionsAndTags(
                self.cid,
                0,
                spaces.as_concrete_TypeRef(),
                options.bits(),
                &mut set_tags,
                &mut clear_tags,
            )
        };
        let windows = owned_array(raw, "CGSCopyWindowsWithOptionsAndTags")?;
        windows
            .iter()
            .map(|w| {
                as_i64(&w)
                    .and_then(|n| u32::try_from(n).ok())
                    .map(WindowId)
                    .ok_or_else(|| SkyLightError("window id is not a number".into()))
            })
            .collect()
    }

    fn window_level(&self, window: WindowId) -> Result<i32, Self::Error> {
        let mut level = 0;
        let err = unsafe { ffi::CGSGetWindowLevel(self.cid, window.0, &mut level) };
        if err != ffi::K_CG_ERROR_SUCCESS {
            return Err(SkyLightError(format!(
                "CGSGetWindowLevel({}) failed: {}",
                window, err
            )));
        }
        Ok(level)
    }

    fn spaces_for_windows(
        &self,
        windows: &[WindowId],
        mask: SpaceMask,
    ) -> Result<Vec<SpaceId>, Self::Error> {
        let windows = window_array(windows);
        let raw = unsafe {
            ffi::CGSCopySpacesForWindows(self.cid, mask.raw(), windows.as_concrete_TypeRef())
        };
        let spaces = owned_array(raw, "CGSCopySpacesForWindows")?;
        spaces
            .iter()
            .map(|s| {
                as_i64(&s)
                    .map(|n| SpaceId(n as u64))
                    .ok_or_else(|| SkyLightError("space id is not a number".into()))
            })
            .collect()
    }

    fn space_type(&self, space: SpaceId) -> Result<SpaceType, Self::Error> {
        Ok(SpaceType::from_raw(unsafe { ffi::CGSSpaceGetType(self.cid, space.0) }))
    }

    fn add_windows_to_spaces(
        &self,
        windows: &[WindowId],
        spaces: &[SpaceId],
    ) -> Result<(), Self::Error> {
        let windows = window_array(windows);
        let spaces = space_array(spaces);
        unsafe {
            ffi::CGSAddWindowsToSpaces(
                self.cid,
                windows.as_concrete_TypeRef(),
                spaces.as_concrete_TypeRef(),
            )
        };
        Ok(())
    }

    fn remove_windows_from_spaces(
        &self,
        windows: &[WindowId],
        spaces: &[SpaceId],
    ) -> Result<(), Self::Error> {
        let windows = window_array(windows);
        let spaces = space_array(spaces);
        unsafe {
            ffi::CGSRemoveWindowsFromSpaces(
                self.cid,
                windows.as_concrete_TypeRef(),
                spaces.as_concrete_TypeRef(),
            )
        };
        Ok(())
    }

    fn move_windows_to_managed_space(
        &self,
        windows: &[WindowId],
        space: SpaceId,
    ) -> Result<(), Self::Error> {
        let windows = window_array(windows);
        unsafe {
            ffi::CGSMoveWindowsToManagedSpace(self.cid, windows.as_concrete_TypeRef(), space.0)
        };
        Ok(())
    }

    fn is_accessibility_trusted(&self) -> bool {
        unsafe { ffi::AXIsProcessTrusted() }
    }
}
