use std::path::Path;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::error;
use windows::{
    core::PWSTR,
    Win32::{
        Foundation::{CloseHandle, BOOL, HANDLE},
        System::Threading::{
            OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
            PROCESS_QUERY_LIMITED_INFORMATION,
        },
        UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId},
    },
};

use super::{blocking::BlockingState, ForegroundProbe};

/// Returns the executable name of the foreground window's process, without the extension.
#[tracing::instrument]
pub fn get_foreground_app() -> Result<String> {
    let window = unsafe { GetForegroundWindow() };

    if window.is_invalid() {
        return Err(anyhow!("Failed to get foreground window"));
    }

    let mut id = 0u32;
    unsafe { GetWindowThreadProcessId(window, Some(&mut id)) };
    if id == 0 {
        return Err(anyhow!("Failed to get foreground window process id"));
    }

    let process_handle =
        unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, BOOL::from(false), id) }
            .inspect_err(|e| error!("Failed to open process {e:?}"))?;

    let mut text: [u16; 4096] = [0; 4096];
    let process_path = unsafe { get_process_path(process_handle, &mut text) }
        .inspect_err(|e| error!("Failed to get process path {e:?}"));

    unsafe { CloseHandle(process_handle) }
        .inspect_err(|e| error!("Failed to close handle {e:?}"))?;

    let process_path = process_path?;
    Path::new(&process_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("Process path {process_path} has no file name"))
}

unsafe fn get_process_path(process_handle: HANDLE, text: &mut [u16]) -> Result<String> {
    unsafe {
        let mut length = text.len() as u32;
        QueryFullProcessImageNameW(
            process_handle,
            PROCESS_NAME_WIN32,
            PWSTR(text.as_mut_ptr()),
            &mut length,
        )?;
        Ok(String::from_utf16_lossy(&text[..length as usize]))
    }
}

/// Win32 calls run on the blocking pool, one at a time.
pub struct WindowsProbe {
    calls: BlockingState<()>,
}

impl WindowsProbe {
    pub fn new() -> Self {
        Self {
            calls: BlockingState::new(()),
        }
    }
}

impl Default for WindowsProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ForegroundProbe for WindowsProbe {
    async fn current_foreground_app(&mut self) -> Result<String> {
        self.calls.run(|_| get_foreground_app()).await
    }
}
