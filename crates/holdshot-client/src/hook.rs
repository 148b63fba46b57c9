//! Global pointer-button hook.
//!
//! On Windows this installs a low-level mouse hook (`WH_MOUSE_LL`) on a
//! dedicated thread that runs its own message loop, and forwards primary
//! button transitions into a channel consumed by the gesture detector.

use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::gesture::PointerEvent;

#[cfg(windows)]
mod imp {
    use std::sync::OnceLock;
    use std::time::Instant;

    use tokio::sync::mpsc;
    use windows_sys::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
    use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, SetWindowsHookExW, TranslateMessage,
        UnhookWindowsHookEx, MSG, WH_MOUSE_LL, WM_LBUTTONDOWN, WM_LBUTTONUP,
    };

    use crate::error::ClientError;
    use crate::gesture::PointerEvent;

    /// The hook callback has no user-data pointer, so the event channel
    /// lives in a process-wide slot. Set once by [`install`].
    static EVENTS: OnceLock<mpsc::Sender<PointerEvent>> = OnceLock::new();

    pub fn install(events: mpsc::Sender<PointerEvent>) -> Result<(), ClientError> {
        if EVENTS.set(events).is_err() {
            return Err(ClientError::Hook(
                "Pointer hook already installed".to_string(),
            ));
        }

        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), std::io::Error>>();
        std::thread::Builder::new()
            .name("pointer-hook".to_string())
            .spawn(move || unsafe {
                let module = GetModuleHandleW(std::ptr::null());
                let hook = SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), module, 0);
                if hook.is_null() {
                    let _ = ready_tx.send(Err(std::io::Error::last_os_error()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // A low-level hook only fires while this thread pumps
                // messages.
                let mut msg: MSG = std::mem::zeroed();
                while GetMessageW(&mut msg, std::ptr::null_mut(), 0, 0) > 0 {
                    TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
                UnhookWindowsHookEx(hook);
            })
            .map_err(|e| ClientError::Hook(format!("Failed to spawn hook thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ClientError::Hook(format!(
                "Failed to install pointer hook: {}",
                e
            ))),
            Err(_) => Err(ClientError::Hook(
                "Pointer hook thread exited during startup".to_string(),
            )),
        }
    }

    unsafe extern "system" fn mouse_hook_proc(
        code: i32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        if code >= 0 {
            let event = match wparam as u32 {
                WM_LBUTTONDOWN => Some(PointerEvent::Pressed { at: Instant::now() }),
                WM_LBUTTONUP => Some(PointerEvent::Released { at: Instant::now() }),
                _ => None,
            };
            if let Some(event) = event {
                if let Some(events) = EVENTS.get() {
                    // The hook must never block; if the channel is full
                    // the event is dropped.
                    let _ = events.try_send(event);
                }
            }
        }
        CallNextHookEx(std::ptr::null_mut(), code, wparam, lparam)
    }
}

/// Install the global pointer hook and stream button events into `events`.
///
/// Returns once the hook is active. Fails if a hook is already installed
/// or the operating system rejects it.
#[cfg(windows)]
pub fn install(events: mpsc::Sender<PointerEvent>) -> Result<(), ClientError> {
    imp::install(events)
}

/// Pointer hooks are not available on this platform.
#[cfg(not(windows))]
pub fn install(_events: mpsc::Sender<PointerEvent>) -> Result<(), ClientError> {
    Err(ClientError::Hook(
        "Global pointer hooks are currently implemented for Windows only".to_string(),
    ))
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn test_install_unsupported_off_windows() {
        let (tx, _rx) = mpsc::channel(4);
        let err = install(tx).unwrap_err();
        assert!(err.to_string().contains("Windows only"));
    }
}
