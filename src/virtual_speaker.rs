//! Optional virtual output device bootstrap.
//!
//! Some users route the synthesized voice into conferencing software through a
//! VB-Cable style virtual device. This module installs that driver on request
//! and otherwise stays completely out of the session's way: it runs before the
//! engine is constructed and never interacts with it afterwards.

use std::env;

pub type InstallResult = std::result::Result<(), String>;

fn env_truthy(name: &str) -> bool {
    matches!(
        env::var(name).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

pub fn auto_install_requested() -> bool {
    env_truthy("SPEAKTERM_AUTO_INSTALL_VIRTUAL_SPEAKER")
}

pub fn force_install_requested() -> bool {
    env_truthy("SPEAKTERM_FORCE_VIRTUAL_SPEAKER")
}

/// Run the installer when the flag or the auto-install env asks for it.
/// Returns `Some(exit_code)` when the flag was given and the process should
/// exit with the install status; `None` means startup continues normally.
pub fn maybe_install(from_flag: bool, force_flag: bool) -> Option<i32> {
    let auto = auto_install_requested();
    if !from_flag && !auto {
        return None;
    }

    let force = force_flag || force_install_requested();
    let outcome = install_virtual_speaker(force);
    match &outcome {
        Ok(()) => eprintln!("Virtual speaker ready"),
        Err(reason) => eprintln!("Virtual speaker install failed: {reason}"),
    }

    if from_flag {
        Some(if outcome.is_ok() { 0 } else { 1 })
    } else {
        // Auto-install is best effort; the session still runs without the
        // virtual device.
        None
    }
}

/// Install the VB-Cable virtual audio driver via winget.
#[cfg(windows)]
pub fn install_virtual_speaker(force: bool) -> InstallResult {
    use std::process::Command;

    if !force && device_present() {
        return Ok(());
    }

    let status = Command::new("winget")
        .args([
            "install",
            "--id",
            "VBAudio.VBCable",
            "--silent",
            "--accept-package-agreements",
            "--accept-source-agreements",
        ])
        .status()
        .map_err(|err| format!("failed to run winget: {err}"))?;

    if status.success() {
        Ok(())
    } else {
        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Err(format!("winget exited with code {code}"))
    }
}

#[cfg(windows)]
fn device_present() -> bool {
    use std::process::Command;

    let output = Command::new("powershell")
        .args([
            "-NoProfile",
            "-Command",
            "Get-CimInstance Win32_SoundDevice | Select-Object -ExpandProperty Name",
        ])
        .output();
    match output {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains("VB-Audio"),
        Err(_) => false,
    }
}

#[cfg(not(windows))]
pub fn install_virtual_speaker(force: bool) -> InstallResult {
    let _ = force;
    Err("the virtual speaker driver is only supported on Windows".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env mutation is process-global, so everything touching these vars lives
    // in a single test.
    #[test]
    fn env_toggles_gate_the_installer() {
        env::remove_var("SPEAKTERM_AUTO_INSTALL_VIRTUAL_SPEAKER");
        env::remove_var("SPEAKTERM_FORCE_VIRTUAL_SPEAKER");
        assert!(!auto_install_requested());
        assert!(!force_install_requested());
        assert_eq!(maybe_install(false, false), None);

        for value in ["1", "true", "yes", "TRUE", "Yes"] {
            env::set_var("SPEAKTERM_FORCE_VIRTUAL_SPEAKER", value);
            assert!(force_install_requested(), "{value} should be truthy");
        }
        env::set_var("SPEAKTERM_FORCE_VIRTUAL_SPEAKER", "0");
        assert!(!force_install_requested());
        env::remove_var("SPEAKTERM_FORCE_VIRTUAL_SPEAKER");
    }

    #[cfg(not(windows))]
    #[test]
    fn install_reports_unsupported_off_windows() {
        let err = install_virtual_speaker(false).unwrap_err();
        assert!(err.contains("Windows"));
    }
}
