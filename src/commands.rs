//! CLI commands
//! Each handler drives the shared controller the way a UI screen would:
//! trigger an action, then read the published state.

use anyhow::{Context, Result, anyhow, bail};
use log::info;

use crate::catalog::Catalog;
use crate::core::ConnectionController;
use crate::core::bluetooth::Command;
use crate::state::AppState;

/// Prints every grade and its projects with their command codes
pub fn list_projects(catalog: &Catalog) {
    for grade in catalog.grades() {
        println!("{} (id {})", grade.label, grade.id);
        for project in &grade.projects {
            println!("  {}.{}  [{}]  {}", grade.id, project.id, project.command, project.name);
        }
    }
    println!("Stop command: {}", catalog.stop_command());
}

pub fn status(app_state: &AppState) {
    let state = app_state.controller.snapshot();
    if state.is_supported {
        println!("Bluetooth is available.");
    } else {
        println!("Bluetooth is not available on this computer.");
    }
}

/// Opens the device picker and connects to the chosen board
pub async fn connect(controller: &ConnectionController) -> Result<()> {
    controller.scan_and_connect().await;
    let state = controller.snapshot();
    if let Some(error) = state.last_error {
        bail!(error);
    }
    match state.device {
        Some(device) if state.is_connected => {
            println!("Connected to {}", device.display_name);
            Ok(())
        }
        _ => bail!("No device selected"),
    }
}

/// Sends a command and turns a `false` result into the published error
pub async fn send(controller: &ConnectionController, command: &Command) -> Result<()> {
    if controller.send_command(command).await {
        if command.is_stop() {
            println!("Board stopped");
        } else {
            println!("Command sent: {}", command);
        }
        Ok(())
    } else {
        let error = controller
            .snapshot()
            .last_error
            .unwrap_or_else(|| "Failed to send command".to_string());
        Err(anyhow!(error))
    }
}

/// Connects, sends one raw code, disconnects
pub async fn send_code(app_state: &AppState, code: &str) -> Result<()> {
    let command = Command::parse_code(code)?;
    if let Some((grade, project)) = app_state.catalog.find_by_command(&command) {
        info!("{} is {} / {}", command, grade.label, project.name);
    }

    let controller = app_state.controller.as_ref();
    connect(controller).await?;
    let result = send(controller, &command).await;
    controller.disconnect().await;
    result
}

/// Starts a project, waits for Enter, then sends stop
pub async fn run_project(app_state: &AppState, grade_id: u32, project_id: u32) -> Result<()> {
    let project = app_state.catalog.project(grade_id, project_id)?.clone();
    println!("{}\n\n{}\n", project.name, project.procedure);

    let controller = app_state.controller.as_ref();
    connect(controller).await?;
    if let Err(e) = send(controller, &project.command).await {
        controller.disconnect().await;
        return Err(e);
    }

    println!("Running. Press Enter to stop.");
    let mut state = controller.subscribe();
    tokio::select! {
        line = app_state.input.read_line() => {
            line.context("reading stdin")?;
        }
        lost = state.wait_for(|s| !s.is_connected) => {
            if lost.is_ok() {
                bail!("Board disconnected while the project was running");
            }
        }
    }

    let stopped = send(controller, app_state.catalog.stop_command()).await;
    controller.disconnect().await;
    stopped
}
