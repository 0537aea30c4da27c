//! Camera capture session
//!
//! Single owner of the device lifecycle. Bring-up, the trigger enable
//! handshake, runtime control and ordered teardown all pass through one
//! place, so no two callers ever race on the device.

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    CameraDescriptor, CameraSettings, FrameCallback, SyncTuning, TriggerConfig, TriggerSwitch,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::control::CameraControl;
use crate::error::{Result, RigError};

/// Delay between trigger enable attempts during bring-up
const ENABLE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Runtime command accepted by a running session
#[derive(Debug)]
pub enum SessionCommand {
    /// Start the acquisition stream
    StreamOn,
    /// Stop the acquisition stream without closing the device
    StreamOff,
    /// Rewrite dynamic image settings
    ApplySettings(CameraSettings),
    /// Stop streaming and close the device
    Shutdown,
}

/// Camera capture session
///
/// # Bring-up order
/// open -> apply settings -> configure trigger -> attach callback ->
/// stream on -> enable trigger output (bounded retries).
///
/// # Teardown order
/// stream off -> detach callback -> close.
pub struct CameraSession<C: CameraControl, S: TriggerSwitch> {
    control: C,
    switch: Arc<S>,
    trigger: TriggerConfig,
    tuning: SyncTuning,
    descriptor: Option<CameraDescriptor>,
}

impl<C: CameraControl, S: TriggerSwitch> CameraSession<C, S> {
    /// Create a new session around an unopened device
    pub fn new(control: C, switch: Arc<S>, trigger: TriggerConfig, tuning: SyncTuning) -> Self {
        Self {
            control,
            switch,
            trigger,
            tuning,
            descriptor: None,
        }
    }

    /// Bring the camera up and start delivering frames
    ///
    /// When external triggering is configured, the pulse source is asked to
    /// enable output after the stream is running, so the first pulses already
    /// find an exposing sensor.
    #[instrument(
        name = "session_start",
        skip(self, settings, callback),
        fields(camera_id = %self.control.camera_id())
    )]
    pub async fn start(
        &mut self,
        settings: &CameraSettings,
        callback: FrameCallback,
    ) -> Result<CameraDescriptor> {
        let descriptor = self.control.open().await?;
        info!(
            model = %descriptor.model,
            serial = %descriptor.serial,
            "camera opened"
        );

        self.control.apply_settings(settings).await?;
        self.control.configure_trigger(&self.trigger).await?;
        self.control.attach_frame_callback(callback);
        self.control.set_streaming(true).await?;

        if self.trigger.enabled {
            self.enable_trigger_output().await?;
        } else {
            info!("external trigger disabled, free-run capture");
        }

        self.descriptor = Some(descriptor.clone());
        Ok(descriptor)
    }

    /// Enable handshake with the pulse source
    ///
    /// The source may still be booting when the camera comes up, so refused
    /// requests are retried on a fixed delay up to the configured attempt
    /// budget.
    async fn enable_trigger_output(&self) -> Result<()> {
        let attempts = self.tuning.startup_enable_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.switch.set_enabled(true).await {
                Ok(()) => {
                    info!(
                        source = %self.switch.target(),
                        attempt,
                        "trigger output enabled"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        source = %self.switch.target(),
                        attempt,
                        error = %e,
                        "trigger enable refused"
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                tokio::time::sleep(ENABLE_RETRY_DELAY).await;
            }
        }

        Err(RigError::TriggerEnableFailed {
            source_id: self.switch.target().to_string(),
            attempts,
            message: last_error,
        })
    }

    /// Execute one command. Returns `false` once the session has shut down.
    pub async fn handle(&mut self, command: SessionCommand) -> Result<bool> {
        match command {
            SessionCommand::StreamOn => {
                self.control.set_streaming(true).await?;
                Ok(true)
            }
            SessionCommand::StreamOff => {
                self.control.set_streaming(false).await?;
                Ok(true)
            }
            SessionCommand::ApplySettings(settings) => {
                self.control.apply_settings(&settings).await?;
                info!(camera_id = %self.control.camera_id(), "settings rewritten");
                Ok(true)
            }
            SessionCommand::Shutdown => {
                self.shutdown().await?;
                Ok(false)
            }
        }
    }

    /// Ordered teardown
    ///
    /// The stream is stopped before the callback is detached, so the delivery
    /// thread can never fire into a torn-down pipeline.
    #[instrument(
        name = "session_shutdown",
        skip(self),
        fields(camera_id = %self.control.camera_id())
    )]
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Err(e) = self.control.set_streaming(false).await {
            warn!(error = %e, "stream off failed during shutdown");
        }
        self.control.detach_frame_callback();
        self.control.close().await?;

        self.descriptor = None;
        info!("camera session closed");
        Ok(())
    }

    /// Descriptor of the opened device, if the session has started
    pub fn descriptor(&self) -> Option<&CameraDescriptor> {
        self.descriptor.as_ref()
    }

    /// Consume commands until `Shutdown` arrives or all senders drop
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> Result<()> {
        while let Some(command) = commands.recv().await {
            debug!(?command, "session command");
            if !self.handle(command).await? {
                return Ok(());
            }
        }

        // All handles dropped without an explicit shutdown: tear down anyway.
        self.shutdown().await
    }

    /// Move the session onto its own task and return a command handle
    pub fn spawn(self, capacity: usize) -> SessionHandle
    where
        C: 'static,
        S: 'static,
    {
        let camera_id = self.control.camera_id().to_string();
        let (commands, rx) = mpsc::channel(capacity.max(1));
        let join = tokio::spawn(self.run(rx));

        SessionHandle {
            camera_id,
            commands,
            join,
        }
    }
}

/// Handle to a spawned session
pub struct SessionHandle {
    camera_id: String,
    commands: mpsc::Sender<SessionCommand>,
    join: JoinHandle<Result<()>>,
}

impl SessionHandle {
    /// Submit a command to the session task
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RigError::SessionClosed {
                camera_id: self.camera_id.clone(),
            })
    }

    /// Shut the session down and wait for the task to finish
    pub async fn shutdown(self) -> Result<()> {
        // The task may have already exited; a closed channel is fine here.
        let _ = self.commands.send(SessionCommand::Shutdown).await;

        match self.join.await {
            Ok(result) => result,
            Err(_) => Err(RigError::SessionClosed {
                camera_id: self.camera_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_rig::{MockRig, MockRigConfig};

    fn test_rig(config: MockRigConfig) -> MockRig {
        MockRig::new(
            "cam_main",
            "gimbal_imu",
            MockRigConfig {
                frame_rate_hz: 500.0,
                width: 8,
                height: 8,
                ..config
            },
        )
    }

    fn quick_tuning() -> SyncTuning {
        SyncTuning {
            startup_enable_attempts: 3,
            ..SyncTuning::default()
        }
    }

    fn session_for(
        rig: &MockRig,
        trigger: TriggerConfig,
        tuning: SyncTuning,
    ) -> CameraSession<crate::mock_rig::MockCamera, crate::mock_rig::MockTriggerSwitch> {
        CameraSession::new(rig.camera(), Arc::new(rig.switch()), trigger, tuning)
    }

    #[tokio::test]
    async fn test_start_runs_bring_up_in_order() {
        let rig = test_rig(MockRigConfig::default());
        let mut session = session_for(&rig, TriggerConfig::default(), quick_tuning());

        let descriptor = session
            .start(&CameraSettings::default(), Arc::new(|_| {}))
            .await
            .unwrap();

        assert_eq!(descriptor.model, "MockVision MV-210");
        assert_eq!(
            rig.operations(),
            vec![
                "open",
                "apply_settings",
                "configure_trigger",
                "attach_callback",
                "stream_on"
            ]
        );
        assert_eq!(rig.enable_requests(), vec![true]);
        assert!(rig.applied_settings().is_some());
        assert!(session.descriptor().is_some());
    }

    #[tokio::test]
    async fn test_free_run_start_skips_enable_handshake() {
        let rig = test_rig(MockRigConfig::default());
        let trigger = TriggerConfig {
            enabled: false,
            ..TriggerConfig::default()
        };
        let mut session = session_for(&rig, trigger, quick_tuning());

        session
            .start(&CameraSettings::default(), Arc::new(|_| {}))
            .await
            .unwrap();

        assert!(rig.enable_requests().is_empty());
    }

    #[tokio::test]
    async fn test_start_retries_refused_enable() {
        let rig = test_rig(MockRigConfig {
            enable_failures: 1,
            ..MockRigConfig::default()
        });
        let mut session = session_for(&rig, TriggerConfig::default(), quick_tuning());

        session
            .start(&CameraSettings::default(), Arc::new(|_| {}))
            .await
            .unwrap();

        assert_eq!(rig.enable_requests(), vec![true, true]);
    }

    #[tokio::test]
    async fn test_start_fails_when_enable_budget_exhausted() {
        let rig = test_rig(MockRigConfig {
            enable_failures: 10,
            ..MockRigConfig::default()
        });
        let tuning = SyncTuning {
            startup_enable_attempts: 2,
            ..SyncTuning::default()
        };
        let mut session = session_for(&rig, TriggerConfig::default(), tuning);

        let err = session
            .start(&CameraSettings::default(), Arc::new(|_| {}))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RigError::TriggerEnableFailed { attempts: 2, .. }
        ));
        assert_eq!(rig.enable_requests(), vec![true, true]);
    }

    #[tokio::test]
    async fn test_open_failure_propagates() {
        let rig = test_rig(MockRigConfig {
            fail_open: true,
            ..MockRigConfig::default()
        });
        let mut session = session_for(&rig, TriggerConfig::default(), quick_tuning());

        let err = session
            .start(&CameraSettings::default(), Arc::new(|_| {}))
            .await
            .unwrap_err();

        assert!(matches!(err, RigError::DeviceOpenFailed { .. }));
        assert!(rig.operations().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_tears_down_in_order() {
        let rig = test_rig(MockRigConfig::default());
        let mut session = session_for(&rig, TriggerConfig::default(), quick_tuning());

        session
            .start(&CameraSettings::default(), Arc::new(|_| {}))
            .await
            .unwrap();
        session.shutdown().await.unwrap();

        let ops = rig.operations();
        assert_eq!(
            &ops[ops.len() - 3..],
            &["stream_off", "detach_callback", "close"]
        );
        assert!(session.descriptor().is_none());
    }

    #[tokio::test]
    async fn test_spawned_session_processes_commands() {
        let rig = test_rig(MockRigConfig::default());
        let camera = rig.camera();
        let mut session = session_for(&rig, TriggerConfig::default(), quick_tuning());

        session
            .start(&CameraSettings::default(), Arc::new(|_| {}))
            .await
            .unwrap();
        let handle = session.spawn(8);

        handle.send(SessionCommand::StreamOff).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!camera.is_streaming());

        handle.send(SessionCommand::StreamOn).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(camera.is_streaming());

        handle.shutdown().await.unwrap();
        let ops = rig.operations();
        assert_eq!(&ops[ops.len() - 3..], &["stream_off", "detach_callback", "close"]);
    }
}
