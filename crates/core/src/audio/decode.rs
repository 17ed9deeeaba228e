use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::{Result, VisualizerError};

use super::DecodedAudio;

fn decode_err(context: &str, err: impl std::fmt::Display) -> VisualizerError {
    VisualizerError::DecodeFailure(format!("{context}: {err}"))
}

/// Decodes an audio file into mono samples. Any failure, including an empty
/// stream, is reported as [`VisualizerError::DecodeFailure`].
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = std::fs::File::open(path)
        .map_err(|err| decode_err(&format!("cannot open {}", path.display()), err))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|err| decode_err("unrecognised format", err))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| VisualizerError::DecodeFailure("no audio tracks found".into()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| VisualizerError::DecodeFailure("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| decode_err("unsupported codec", err))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(err) => return Err(decode_err("corrupt stream", err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(err)) => {
                tracing::warn!(error = err, "skipping undecodable packet");
                continue;
            }
            Err(err) => return Err(decode_err("decoder error", err)),
        };

        // Containers may omit the channel layout, so trust the packet.
        let spec = *decoded.spec();
        let mut buffer = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        downmix_into(&mut samples, buffer.samples(), spec.channels.count());
    }

    if samples.is_empty() {
        return Err(VisualizerError::DecodeFailure(format!(
            "{} contains no audio frames",
            path.display()
        )));
    }

    let audio = DecodedAudio::from_samples(samples, sample_rate);
    tracing::info!(
        path = %path.display(),
        sample_rate,
        seconds = audio.duration(),
        "decoded audio"
    );
    Ok(audio)
}

/// Averages interleaved frames of `channels` samples into mono.
fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_decode_failure() {
        let err = decode_file(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, VisualizerError::DecodeFailure(_)));
    }

    #[test]
    fn downmix_follows_the_packet_channel_count() {
        let mut out = Vec::new();
        downmix_into(&mut out, &[0.5, -0.5, 1.0, 0.0], 2);
        assert_eq!(out, vec![0.0, 0.5]);

        downmix_into(&mut out, &[0.25, 0.75], 1);
        assert_eq!(out, vec![0.0, 0.5, 0.25, 0.75]);

        let mut surround = Vec::new();
        downmix_into(&mut surround, &[0.6; 12], 6);
        assert_eq!(surround.len(), 2);
        assert!(surround.iter().all(|s| (s - 0.6).abs() < 1e-6));
    }

    #[test]
    fn stereo_wave_decodes_to_mono_duration() {
        let sample_rate = 8_000u32;
        let frames = 4_000u32;
        let data_len = frames * 4;
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&(sample_rate * 4).to_le_bytes());
        wav.extend_from_slice(&4u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        for _ in 0..frames {
            wav.extend_from_slice(&8_192i16.to_le_bytes());
            wav.extend_from_slice(&(-8_192i16).to_le_bytes());
        }

        let path = std::env::temp_dir().join("pulse-visualiser-stereo.wav");
        std::fs::write(&path, &wav).unwrap();
        let audio = decode_file(&path).unwrap();
        let _ = std::fs::remove_file(path);

        assert_eq!(audio.sample_rate, sample_rate);
        assert_eq!(audio.samples.len(), frames as usize);
        assert!((audio.duration() - 0.5).abs() < 1e-9);
        assert!(audio.samples.iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn garbage_is_a_decode_failure() {
        let path = std::env::temp_dir().join("pulse-visualiser-garbage.wav");
        std::fs::write(&path, b"definitely not a wave file").unwrap();
        let err = decode_file(&path).unwrap_err();
        assert!(matches!(err, VisualizerError::DecodeFailure(_)));
        let _ = std::fs::remove_file(path);
    }
}
