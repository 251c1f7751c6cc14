use crate::audio::AudioSink;
use crate::{CoachError, Result};
use async_trait::async_trait;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

enum PlaybackJob {
    Samples {
        samples: Vec<f32>,
        sample_rate: u32,
        done: oneshot::Sender<Result<()>>,
    },
    Encoded {
        bytes: Vec<u8>,
        done: oneshot::Sender<Result<()>>,
    },
}

struct Playing {
    sink: Sink,
    done: Option<oneshot::Sender<Result<()>>>,
    is_speech: bool,
}

impl Playing {
    fn resolve(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(Ok(()));
        }
    }
}

/// Speaker output on the default device.
///
/// rodio's output stream is not `Send`, so it lives on a dedicated playback
/// thread fed through a channel. Bells mix over speech; new speech stops the
/// previous utterance.
pub struct SpeakerSink {
    job_tx: Sender<PlaybackJob>,
}

impl SpeakerSink {
    /// Open the default output device
    pub fn new() -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<PlaybackJob>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        thread::Builder::new()
            .name("speaker".into())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(CoachError::AudioDeviceError(format!(
                            "No output device available: {}",
                            e
                        ))));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                info!("Speaker playback thread started");

                let mut playing: Vec<Playing> = Vec::new();
                loop {
                    match job_rx.recv_timeout(Duration::from_millis(20)) {
                        Ok(job) => {
                            let (source_sink, done, is_speech) = match job {
                                PlaybackJob::Samples {
                                    samples,
                                    sample_rate,
                                    done,
                                } => {
                                    let sink = match Sink::try_new(&handle) {
                                        Ok(sink) => sink,
                                        Err(e) => {
                                            let _ = done.send(Err(CoachError::AudioDeviceError(
                                                e.to_string(),
                                            )));
                                            continue;
                                        }
                                    };
                                    sink.append(SamplesBuffer::new(1, sample_rate, samples));
                                    (sink, done, false)
                                }
                                PlaybackJob::Encoded { bytes, done } => {
                                    let decoder = match Decoder::new(Cursor::new(bytes)) {
                                        Ok(decoder) => decoder,
                                        Err(e) => {
                                            let _ = done.send(Err(CoachError::SpeechError(
                                                format!("Undecodable speech payload: {}", e),
                                            )));
                                            continue;
                                        }
                                    };
                                    let sink = match Sink::try_new(&handle) {
                                        Ok(sink) => sink,
                                        Err(e) => {
                                            let _ = done.send(Err(CoachError::AudioDeviceError(
                                                e.to_string(),
                                            )));
                                            continue;
                                        }
                                    };
                                    for previous in playing.iter_mut().filter(|p| p.is_speech) {
                                        debug!("Superseding unfinished speech");
                                        previous.sink.stop();
                                    }
                                    sink.append(decoder);
                                    (sink, done, true)
                                }
                            };
                            playing.push(Playing {
                                sink: source_sink,
                                done: Some(done),
                                is_speech,
                            });
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }

                    playing.retain_mut(|p| {
                        if p.sink.empty() {
                            p.resolve();
                            false
                        } else {
                            true
                        }
                    });
                }

                for mut p in playing {
                    p.sink.stop();
                    p.resolve();
                }
                info!("Speaker playback thread stopped");
            })
            .map_err(|e| CoachError::AudioDeviceError(format!("Failed to spawn playback: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| CoachError::AudioDeviceError("Playback thread exited".into()))??;

        Ok(Self { job_tx })
    }

    async fn submit(&self, job: PlaybackJob, done_rx: oneshot::Receiver<Result<()>>) -> Result<()> {
        self.job_tx
            .send(job)
            .map_err(|e| CoachError::ChannelError(format!("Playback thread gone: {}", e)))?;
        done_rx.await.unwrap_or_else(|_| {
            warn!("Playback finished without a completion signal");
            Ok(())
        })
    }
}

#[async_trait]
impl AudioSink for SpeakerSink {
    async fn play_samples(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        let (done, done_rx) = oneshot::channel();
        self.submit(
            PlaybackJob::Samples {
                samples,
                sample_rate,
                done,
            },
            done_rx,
        )
        .await
    }

    async fn play_encoded(&self, bytes: Vec<u8>) -> Result<()> {
        if bytes.is_empty() {
            error!("Refusing to play an empty speech payload");
            return Err(CoachError::SpeechError("Empty audio payload".into()));
        }
        let (done, done_rx) = oneshot::channel();
        self.submit(PlaybackJob::Encoded { bytes, done }, done_rx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::bell_tone;

    #[tokio::test]
    async fn test_speaker_plays_bell() {
        // This test might fail in CI environments without audio devices
        if let Ok(sink) = SpeakerSink::new() {
            assert!(sink.play_samples(bell_tone(8_000), 8_000).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_speaker_rejects_garbage() {
        if let Ok(sink) = SpeakerSink::new() {
            assert!(sink.play_encoded(vec![0u8; 16]).await.is_err());
            assert!(sink.play_encoded(Vec::new()).await.is_err());
        }
    }
}
