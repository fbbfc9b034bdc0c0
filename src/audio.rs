// src/audio.rs

use std::sync::{Arc, Mutex, MutexGuard};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};

use crate::config::PlayerConfig;
use crate::decoder::{DeviceLayout, PreparedAudio};
use crate::engine::output::{AudioOutput, OutputFactory, SourceBus, SourceHandle};
use crate::error::{PlayerError, Result};

/// Helper struct to hold output device info
pub struct OutputConfig {
    pub device: Device,
    pub config: StreamConfig,
    pub sample_format: SampleFormat,
    pub output_channels: usize,
    pub output_sample_rate: u32,
}

impl OutputConfig {
    pub fn layout(&self) -> DeviceLayout {
        DeviceLayout::new(self.output_channels, self.output_sample_rate)
    }
}

/// Finds the default audio output device and its config.
pub fn setup_output_device() -> Result<OutputConfig> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlayerError::Output("no output device available".into()))?;
    let supported_config = device
        .default_output_config()
        .map_err(|e| PlayerError::Output(format!("no usable output config: {e}")))?;
    let sample_format = supported_config.sample_format();
    let config = supported_config.config();
    let output_channels = config.channels as usize;
    let output_sample_rate = config.sample_rate.0;

    log::info!(
        "Output device: {} channels at {} Hz ({:?})",
        output_channels,
        output_sample_rate,
        sample_format
    );

    Ok(OutputConfig {
        device,
        config,
        sample_format,
        output_channels,
        output_sample_rate,
    })
}

/// Build CPAL output stream that pulls from the shared bus.
pub fn build_stream<T>(device: &Device, config: &StreamConfig, bus: Arc<Mutex<SourceBus>>) -> Result<Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + SizedSample,
{
    let mut scratch: Vec<f32> = Vec::with_capacity(4096);
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                match bus.lock() {
                    Ok(mut bus) => bus.render(&mut scratch),
                    Err(_) => scratch.fill(0.0),
                }
                for (out, s) in data.iter_mut().zip(&scratch) {
                    *out = T::from_sample(*s);
                }
            },
            |err| log::error!("Output stream error: {err}"),
            None,
        )
        .map_err(|e| PlayerError::Output(format!("failed to build output stream: {e}")))
}

/// Plays through the default cpal device. The stream runs for the whole life
/// of the output; suspending only silences the bus and freezes its clock.
pub struct CpalOutput {
    bus: Arc<Mutex<SourceBus>>,
    stream: Option<Stream>,
    layout: DeviceLayout,
}

impl CpalOutput {
    pub fn open(fade_ms: u32) -> Result<Self> {
        let output = setup_output_device()?;
        let bus = Arc::new(Mutex::new(SourceBus::new(
            output.output_channels,
            output.output_sample_rate,
            fade_ms,
        )));

        let stream = match output.sample_format {
            SampleFormat::F32 => build_stream::<f32>(&output.device, &output.config, bus.clone())?,
            SampleFormat::I16 => build_stream::<i16>(&output.device, &output.config, bus.clone())?,
            SampleFormat::U16 => build_stream::<u16>(&output.device, &output.config, bus.clone())?,
            other => {
                return Err(PlayerError::Output(format!("unsupported sample format {other:?}")));
            }
        };
        stream
            .play()
            .map_err(|e| PlayerError::Output(format!("failed to start output stream: {e}")))?;

        Ok(Self { bus, stream: Some(stream), layout: output.layout() })
    }

    fn bus(&self) -> Result<MutexGuard<'_, SourceBus>> {
        self.bus
            .lock()
            .map_err(|_| PlayerError::Output("audio bus lock poisoned".into()))
    }
}

impl AudioOutput for CpalOutput {
    fn layout(&self) -> Option<DeviceLayout> {
        Some(self.layout)
    }

    fn bind(&mut self, audio: PreparedAudio) -> Result<()> {
        if audio.layout() != self.layout {
            return Err(PlayerError::Output(format!(
                "audio prepared for {:?}, device is {:?}",
                audio.layout(),
                self.layout
            )));
        }
        self.bus()?.load(audio.into_samples());
        Ok(())
    }

    fn now(&self) -> f64 {
        self.bus.lock().map(|b| b.now()).unwrap_or(0.0)
    }

    fn resume(&mut self) -> Result<()> {
        self.bus()?.set_running(true)
    }

    fn suspend(&mut self) -> Result<()> {
        self.bus()?.set_running(false)
    }

    fn start_source(&mut self, offset_secs: f64) -> Result<SourceHandle> {
        self.bus()?.start(offset_secs)
    }

    fn stop_source(&mut self, handle: SourceHandle) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.stop(handle);
        }
    }

    fn set_gain(&mut self, gain: f32) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.set_gain(gain);
        }
    }

    fn active_sources(&self) -> usize {
        self.bus.lock().map(|b| b.active_sources()).unwrap_or(0)
    }

    fn close(&mut self) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.close();
        }
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            log::debug!("Output stream closed");
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens a [`CpalOutput`] on the default device for every loaded file.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpalFactory;

impl OutputFactory for CpalFactory {
    type Output = CpalOutput;

    fn layout(&mut self) -> Result<Option<DeviceLayout>> {
        setup_output_device().map(|output| Some(output.layout()))
    }

    fn open(&mut self, config: &PlayerConfig) -> Result<CpalOutput> {
        CpalOutput::open(config.fade_in_ms)
    }
}
