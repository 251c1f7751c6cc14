use crate::audio::{AudioCapture, AudioClip, CaptureHandle};
use crate::{CoachError, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// Microphone on the default input device.
///
/// Each capture runs its cpal stream on its own thread (cpal streams are not
/// `Send`) and is stopped through a channel.
#[derive(Debug, Default, Clone)]
pub struct MicrophoneCapture;

impl MicrophoneCapture {
    pub fn new() -> Self {
        Self
    }
}

struct MicrophoneHandle {
    stop_tx: Sender<()>,
    clip_rx: oneshot::Receiver<AudioClip>,
}

#[async_trait]
impl CaptureHandle for MicrophoneHandle {
    async fn finish(self: Box<Self>) -> Result<AudioClip> {
        let _ = self.stop_tx.send(());
        self.clip_rx
            .await
            .map_err(|_| CoachError::AudioDeviceError("Capture thread exited".into()))
    }
}

#[async_trait]
impl AudioCapture for MicrophoneCapture {
    async fn acquire(&self) -> Result<Box<dyn CaptureHandle>> {
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (clip_tx, clip_rx) = oneshot::channel::<AudioClip>();

        thread::Builder::new()
            .name("microphone".into())
            .spawn(move || {
                let host = cpal::default_host();
                let device = match host.default_input_device() {
                    Some(device) => device,
                    None => {
                        let _ = ready_tx.send(Err(CoachError::AudioDeviceError(
                            "No input device available".into(),
                        )));
                        return;
                    }
                };
                info!(
                    "Using input device: {}",
                    device.name().unwrap_or_else(|_| "Unknown".to_string())
                );

                let config: cpal::StreamConfig = match device.default_input_config() {
                    Ok(config) => config.into(),
                    Err(e) => {
                        let _ = ready_tx.send(Err(CoachError::CapturePermission(format!(
                            "Failed to get input config: {}",
                            e
                        ))));
                        return;
                    }
                };

                let channels = config.channels as usize;
                let sample_rate = config.sample_rate.0;
                let buffer = Arc::new(Mutex::new(Vec::<f32>::with_capacity(
                    sample_rate as usize * 10,
                )));
                let writer = Arc::clone(&buffer);

                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let mut buf = writer.lock();
                        if channels == 1 {
                            buf.extend_from_slice(data);
                        } else {
                            // Average all channels to create mono
                            buf.extend(
                                data.chunks(channels)
                                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                            );
                        }
                    },
                    |err| error!("Audio input stream error: {}", err),
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(CoachError::CapturePermission(format!(
                            "Failed to open input stream: {}",
                            e
                        ))));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(CoachError::CapturePermission(format!(
                        "Failed to start input stream: {}",
                        e
                    ))));
                    return;
                }

                let _ = ready_tx.send(Ok(()));
                debug!("Microphone capture started");

                // Either an explicit stop or a dropped handle ends the capture
                let _ = stop_rx.recv();
                drop(stream);

                let samples = std::mem::take(&mut *buffer.lock());
                debug!("Microphone capture stopped with {} samples", samples.len());
                let _ = clip_tx.send(AudioClip::new(samples, sample_rate));
            })
            .map_err(|e| CoachError::AudioDeviceError(format!("Failed to spawn capture: {}", e)))?;

        ready_rx
            .await
            .map_err(|_| CoachError::AudioDeviceError("Capture thread exited".into()))??;

        Ok(Box::new(MicrophoneHandle { stop_tx, clip_rx }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_microphone_capture_roundtrip() {
        // This test might fail in CI environments without audio devices
        if let Ok(handle) = MicrophoneCapture::new().acquire().await {
            let clip = handle.finish().await.unwrap();
            assert!(clip.sample_rate > 0);
        }
    }
}
