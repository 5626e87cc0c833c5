use crate::media;
use anyhow::{Context, Result};
use rodio::Source;
use rodio::{
    Decoder, DeviceSinkBuilder as OutputStreamBuilder, MixerDeviceSink as OutputStream,
    Player as Sink,
};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// The opaque output the player drives. Position is never read back from
/// the device; the player keeps its own clock.
pub trait PlaybackDevice {
    /// Opens and decodes `path` so it is ready to `play`. Replaces whatever
    /// was loaded before.
    fn load(&mut self, path: &Path) -> Result<()>;
    /// Starts the loaded track from the beginning. With `looping` the track
    /// restarts every time it runs out.
    fn play(&mut self, looping: bool) -> Result<()>;
    fn pause(&mut self);
    fn unpause(&mut self);
    fn stop(&mut self);
    /// Moves within the playing track. Formats that cannot seek fail here;
    /// callers carry on without it.
    fn set_position(&mut self, position: Duration) -> Result<()>;
    /// Audio is still queued for output.
    fn is_busy(&self) -> bool;
    fn duration(&self) -> Option<Duration>;
    fn loaded_track(&self) -> Option<&Path>;
    fn tick(&mut self);
    fn output_name(&self) -> String;
}

/// Opens the system output, falling back to the silent device when no
/// output stream can be started.
pub fn open_default_device() -> Box<dyn PlaybackDevice> {
    match RodioDevice::new() {
        Ok(device) => Box::new(device),
        Err(err) => {
            log::warn!("no audio output available ({err:#}); playing silently");
            Box::new(NullDevice::new())
        }
    }
}

pub struct RodioDevice {
    stream: OutputStream,
    sink: Sink,
    loaded: Option<PathBuf>,
    track_duration: Option<Duration>,
    looping: bool,
}

impl RodioDevice {
    pub fn new() -> Result<Self> {
        let mut stream = with_silenced_stderr(|| {
            OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_sink_or_fallback()
                        .context("failed to start default output stream")
                })
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());

        Ok(Self {
            stream,
            sink,
            loaded: None,
            track_duration: None,
            looping: false,
        })
    }

    fn decode(path: &Path) -> Result<impl Source + Send + 'static> {
        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        Decoder::try_from(file).with_context(|| format!("failed to decode {}", path.display()))
    }

    fn append_loaded(&self) -> Result<()> {
        let path = self.loaded.as_deref().context("no track loaded")?;
        self.sink.append(Self::decode(path)?);
        Ok(())
    }

    fn reset_sink(&mut self) {
        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
    }
}

impl PlaybackDevice for RodioDevice {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.reset_sink();
        self.loaded = None;
        self.track_duration = None;

        let source = Self::decode(path)?;
        self.track_duration = source
            .total_duration()
            .filter(|duration| !duration.is_zero())
            .or_else(|| media::probe_duration(path));
        self.loaded = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self, looping: bool) -> Result<()> {
        self.reset_sink();
        self.looping = looping;
        self.append_loaded()?;
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn unpause(&mut self) {
        self.sink.play();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.looping = false;
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if self.loaded.is_none() {
            anyhow::bail!("no track loaded");
        }
        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))
    }

    fn is_busy(&self) -> bool {
        self.loaded.is_some() && !self.sink.empty()
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn loaded_track(&self) -> Option<&Path> {
        self.loaded.as_deref()
    }

    fn tick(&mut self) {
        if !self.looping || !self.sink.empty() || self.sink.is_paused() {
            return;
        }
        if let Err(err) = self.append_loaded() {
            log::warn!("could not restart looped track: {err:#}");
            self.looping = false;
        }
    }

    fn output_name(&self) -> String {
        String::from("System default output")
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Device that produces no sound but otherwise behaves like a real one: it
/// refuses files it cannot open and stays busy for the track's length.
#[derive(Debug, Default)]
pub struct NullDevice {
    loaded: Option<PathBuf>,
    track_duration: Option<Duration>,
    started_at: Option<Instant>,
    position_offset: Duration,
    paused: bool,
    looping: bool,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        Decoder::try_from(file)
            .ok()
            .and_then(|source| source.total_duration())
            .filter(|duration| !duration.is_zero())
            .or_else(|| media::probe_duration(path))
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        position
    }
}

impl PlaybackDevice for NullDevice {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.stop();
        self.loaded = None;
        self.track_duration = None;
        File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        self.track_duration = Self::estimate_duration(path);
        self.loaded = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self, looping: bool) -> Result<()> {
        if self.loaded.is_none() {
            anyhow::bail!("no track loaded");
        }
        self.looping = looping;
        self.paused = false;
        self.started_at = Some(Instant::now());
        self.position_offset = Duration::ZERO;
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn unpause(&mut self) {
        if self.loaded.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.paused = false;
    }

    fn stop(&mut self) {
        self.paused = false;
        self.looping = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if self.loaded.is_none() {
            anyhow::bail!("no track loaded");
        }
        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = (!self.paused).then(Instant::now);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        if self.loaded.is_none() || (self.started_at.is_none() && !self.paused) {
            return false;
        }
        match self.track_duration {
            Some(duration) => self.looping || self.current_position() < duration,
            None => true,
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn loaded_track(&self) -> Option<&Path> {
        self.loaded.as_deref()
    }

    fn tick(&mut self) {}

    fn output_name(&self) -> String {
        String::from("Silent output")
    }
}

#[cfg(test)]
mod tests {
    use super::{NullDevice, PlaybackDevice};
    use std::fs;
    use std::path::Path;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write_test_wav(path: &Path, duration_ms: u32) {
        let sample_rate: u32 = 44_100;
        let channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let bytes_per_sample = u32::from(bits_per_sample / 8);
        let total_samples = (u64::from(sample_rate) * u64::from(duration_ms) / 1_000) as u32;
        let data_size = total_samples * u32::from(channels) * bytes_per_sample;
        let byte_rate = sample_rate * u32::from(channels) * bytes_per_sample;
        let block_align = channels * (bits_per_sample / 8);

        let mut bytes = Vec::with_capacity((44_u32 + data_size) as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&36_u32.saturating_add(data_size).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16_u32.to_le_bytes());
        bytes.extend_from_slice(&1_u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_size.to_le_bytes());
        bytes.resize((44_u32 + data_size) as usize, 0_u8);

        fs::write(path, bytes).expect("wav fixture should be written");
    }

    #[test]
    fn null_device_refuses_missing_files() {
        let mut device = NullDevice::new();
        assert!(device.load(Path::new("nonexistent-track.flac")).is_err());
        assert!(device.loaded_track().is_none());
        assert!(device.play(false).is_err());
        assert!(!device.is_busy());
    }

    #[test]
    fn null_device_detects_wav_duration_and_goes_idle() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("fixture.wav");
        write_test_wav(&track, 80);

        let mut device = NullDevice::new();
        device.load(&track).expect("load wav fixture");
        let duration = device.duration().expect("duration should be detected");
        assert!(duration >= Duration::from_millis(70));
        assert!(!device.is_busy(), "loaded but not started");

        device.play(false).expect("play");
        assert!(device.is_busy());
        thread::sleep(Duration::from_millis(120));
        assert!(!device.is_busy(), "known-duration playback should finish");
    }

    #[test]
    fn null_device_stays_busy_while_looping_or_paused() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("fixture.wav");
        write_test_wav(&track, 40);

        let mut device = NullDevice::new();
        device.load(&track).expect("load");
        device.play(true).expect("play");
        thread::sleep(Duration::from_millis(80));
        assert!(device.is_busy(), "looping playback never runs dry");

        device.play(false).expect("replay");
        device.pause();
        thread::sleep(Duration::from_millis(80));
        assert!(device.is_busy(), "paused playback keeps its place");
        device.unpause();
        thread::sleep(Duration::from_millis(80));
        assert!(!device.is_busy());
    }

    #[test]
    fn null_device_seek_clamps_to_duration() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("fixture.wav");
        write_test_wav(&track, 500);

        let mut device = NullDevice::new();
        device.load(&track).expect("load");
        device.play(false).expect("play");
        device.set_position(Duration::from_secs(30)).expect("seek");
        assert!(!device.is_busy(), "seeking past the end finishes the track");

        device.stop();
        assert!(!device.is_busy());
        assert_eq!(device.loaded_track(), Some(track.as_path()));
    }
}
