//! libavcodec-backed decode engine.
//!
//! Decodes AC-3, E-AC-3, DTS and AAC frames to interleaved signed 16-bit
//! little-endian PCM.
//!
//! # Safety
//!
//! All FFmpeg functions are inherently unsafe. Every FFmpeg object is owned
//! by exactly one [`FfmpegEngine`] and released in its `Drop`, on every
//! construction path.

#![allow(non_upper_case_globals)]

use crate::backend::{BackendError, BackendLease, BackendRegistry};
use crate::engine::{DecodeEngine, DecodedOutput, EngineError};
use esframe_core::scanner::swap16_in_place;
use esframe_core::{AudioCodec, FrameDescriptor, SyncByteOrder};
use ffmpeg_sys_next as ff;
use std::ptr;
use tracing::{debug, info, warn};

/// Registry name of the process-wide libavcodec state.
pub const FFMPEG_BACKEND: &str = "libavcodec";

/// One-time libavcodec state shared by every engine in the process.
#[derive(Debug)]
pub struct FfmpegRuntime {
    version: u32,
}

impl FfmpegRuntime {
    fn load() -> Result<Self, BackendError> {
        // SAFETY: avcodec_version only reads a compile-time constant.
        let version = unsafe { ff::avcodec_version() };
        if version == 0 {
            return Err(BackendError::load(FFMPEG_BACKEND, "library reports version 0"));
        }
        info!(
            major = version >> 16,
            minor = (version >> 8) & 0xFF,
            micro = version & 0xFF,
            "libavcodec available"
        );
        Ok(Self { version })
    }

    /// Packed libavcodec version.
    pub fn version(&self) -> u32 {
        self.version
    }
}

fn codec_id(codec: AudioCodec) -> ff::AVCodecID {
    match codec {
        // The E-AC-3 decoder also handles plain AC-3 frames.
        AudioCodec::Ac3 | AudioCodec::Eac3 => ff::AVCodecID::AV_CODEC_ID_EAC3,
        AudioCodec::Dts => ff::AVCodecID::AV_CODEC_ID_DTS,
        AudioCodec::Aac => ff::AVCodecID::AV_CODEC_ID_AAC,
    }
}

/// Decode engine wrapping a libavcodec decoder.
pub struct FfmpegEngine {
    codec: AudioCodec,
    ctx: *mut ff::AVCodecContext,
    packet: *mut ff::AVPacket,
    frame: *mut ff::AVFrame,
    /// Frame bytes followed by the padding libavcodec reads past the end.
    input: Vec<u8>,
    _runtime: BackendLease<FfmpegRuntime>,
}

// SAFETY: the FFmpeg objects are only reached through `&mut self`, so they
// are never used from two threads at once.
unsafe impl Send for FfmpegEngine {}

impl FfmpegEngine {
    /// Open a decoder for `codec`.
    pub fn new(codec: AudioCodec) -> Result<Self, EngineError> {
        let runtime = BackendRegistry::global()
            .acquire(FFMPEG_BACKEND, FfmpegRuntime::load)
            .map_err(|e| EngineError::Unsupported(e.to_string()))?;

        let mut engine = Self {
            codec,
            ctx: ptr::null_mut(),
            packet: ptr::null_mut(),
            frame: ptr::null_mut(),
            input: Vec::new(),
            _runtime: runtime,
        };
        // SAFETY: plain allocations; a null result is checked and anything
        // already allocated is released by Drop.
        unsafe {
            engine.packet = ff::av_packet_alloc();
            engine.frame = ff::av_frame_alloc();
        }
        if engine.packet.is_null() || engine.frame.is_null() {
            return Err(EngineError::Resource("cannot allocate packet or frame".into()));
        }
        engine.open(&[])?;
        Ok(engine)
    }

    /// (Re)open the codec context, optionally with extradata.
    ///
    /// The current context is only replaced once the new one opened. A
    /// rejected configuration leaves the previous decoder running; failing
    /// to open the first decoder is a resource failure.
    fn open(&mut self, extradata: &[u8]) -> Result<(), EngineError> {
        // SAFETY: open_context hands back a context it exclusively owns.
        let opened = unsafe { open_context(self.codec, extradata) };
        match opened {
            Ok(ctx) => {
                // SAFETY: the old context is either null or owned by self.
                unsafe {
                    if !self.ctx.is_null() {
                        ff::avcodec_free_context(&mut self.ctx);
                    }
                }
                self.ctx = ctx;
                debug!(codec = %self.codec, extradata = extradata.len(), "libavcodec decoder opened");
                Ok(())
            }
            Err(EngineError::Decode(reason)) if self.ctx.is_null() => {
                Err(EngineError::Resource(reason))
            }
            Err(e) => {
                warn!(codec = %self.codec, error = %e, "Keeping previous libavcodec decoder");
                Err(e)
            }
        }
    }

    /// Append the current frame as interleaved S16LE.
    ///
    /// # Safety
    ///
    /// `self.frame` must hold a frame just returned by the decoder.
    unsafe fn append_s16(&self, channels: usize, out: &mut Vec<u8>) -> Result<(), EngineError> {
        let frame = &*self.frame;
        let nb_samples = usize::try_from(frame.nb_samples).unwrap_or(0);
        out.reserve(nb_samples * channels * 2);

        let mut push = |sample: i16| out.extend_from_slice(&sample.to_le_bytes());
        let from_float = |s: f32| (s.clamp(-1.0, 1.0) * 32767.0) as i16;

        match frame.format {
            f if f == ff::AVSampleFormat::AV_SAMPLE_FMT_S16 as i32 => {
                let data = frame.data[0] as *const i16;
                for i in 0..nb_samples * channels {
                    push(*data.add(i));
                }
            }
            f if f == ff::AVSampleFormat::AV_SAMPLE_FMT_S16P as i32 => {
                for i in 0..nb_samples {
                    for ch in 0..channels {
                        push(*(frame.extended_data.add(ch).read() as *const i16).add(i));
                    }
                }
            }
            f if f == ff::AVSampleFormat::AV_SAMPLE_FMT_FLT as i32 => {
                let data = frame.data[0] as *const f32;
                for i in 0..nb_samples * channels {
                    push(from_float(*data.add(i)));
                }
            }
            f if f == ff::AVSampleFormat::AV_SAMPLE_FMT_FLTP as i32 => {
                for i in 0..nb_samples {
                    for ch in 0..channels {
                        push(from_float(*(frame.extended_data.add(ch).read() as *const f32).add(i)));
                    }
                }
            }
            f if f == ff::AVSampleFormat::AV_SAMPLE_FMT_S32P as i32 => {
                for i in 0..nb_samples {
                    for ch in 0..channels {
                        let s = *(frame.extended_data.add(ch).read() as *const i32).add(i);
                        push((s >> 16) as i16);
                    }
                }
            }
            other => {
                return Err(EngineError::Unsupported(format!("sample format {other}")));
            }
        }
        Ok(())
    }
}

/// Allocate and open a decoder context for `codec`.
///
/// # Safety
///
/// Calls into libavcodec; the returned context is owned by the caller.
unsafe fn open_context(
    codec: AudioCodec,
    extradata: &[u8],
) -> Result<*mut ff::AVCodecContext, EngineError> {
    let decoder = ff::avcodec_find_decoder(codec_id(codec));
    if decoder.is_null() {
        return Err(EngineError::Unsupported(format!(
            "{codec} decoder not built into libavcodec"
        )));
    }

    let mut ctx = ff::avcodec_alloc_context3(decoder);
    if ctx.is_null() {
        return Err(EngineError::Resource("cannot allocate codec context".into()));
    }
    (*ctx).request_sample_fmt = ff::AVSampleFormat::AV_SAMPLE_FMT_S16;

    if !extradata.is_empty() {
        let padding = ff::AV_INPUT_BUFFER_PADDING_SIZE as usize;
        let buf = ff::av_mallocz(extradata.len() + padding) as *mut u8;
        if buf.is_null() {
            ff::avcodec_free_context(&mut ctx);
            return Err(EngineError::Resource("cannot allocate extradata".into()));
        }
        ptr::copy_nonoverlapping(extradata.as_ptr(), buf, extradata.len());
        // Ownership passes to the context.
        (*ctx).extradata = buf;
        (*ctx).extradata_size = extradata.len() as i32;
    }

    let ret = ff::avcodec_open2(ctx, decoder, ptr::null_mut());
    if ret < 0 {
        ff::avcodec_free_context(&mut ctx);
        return Err(EngineError::Decode(format!("avcodec_open2 failed: error {ret}")));
    }
    Ok(ctx)
}

/// Copy `frame` into `input` in native byte order, followed by the padding
/// libavcodec reads past the end.
fn stage_input(input: &mut Vec<u8>, frame: &[u8], order: SyncByteOrder) {
    input.clear();
    input.extend_from_slice(frame);
    if order == SyncByteOrder::Swapped16 {
        swap16_in_place(input);
    }
    input.resize(frame.len() + ff::AV_INPUT_BUFFER_PADDING_SIZE as usize, 0);
}

impl DecodeEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "libavcodec"
    }

    fn configure(&mut self, codec_config: &[u8]) -> Result<(), EngineError> {
        self.open(codec_config)
    }

    fn decode(
        &mut self,
        frame: &[u8],
        desc: &FrameDescriptor,
        out: &mut Vec<u8>,
    ) -> Result<Option<DecodedOutput>, EngineError> {
        let size = i32::try_from(frame.len())
            .map_err(|_| EngineError::Decode(format!("{}-byte frame", frame.len())))?;
        stage_input(&mut self.input, frame, desc.byte_order);

        let start = out.len();
        let mut produced: Option<DecodedOutput> = None;

        // SAFETY: the packet borrows `self.input`, which outlives the send;
        // the packet is detached again before returning.
        unsafe {
            (*self.packet).data = self.input.as_mut_ptr();
            (*self.packet).size = size;
            let ret = ff::avcodec_send_packet(self.ctx, self.packet);
            (*self.packet).data = ptr::null_mut();
            (*self.packet).size = 0;
            if ret < 0 {
                return Err(EngineError::Decode(format!("avcodec_send_packet: error {ret}")));
            }

            loop {
                let ret = ff::avcodec_receive_frame(self.ctx, self.frame);
                if ret == ff::AVERROR(ff::EAGAIN as i32) || ret == ff::AVERROR_EOF {
                    break;
                }
                if ret == ff::AVERROR(ff::ENOMEM as i32) {
                    return Err(EngineError::Resource("libavcodec out of memory".into()));
                }
                if ret < 0 {
                    return Err(EngineError::Decode(format!("avcodec_receive_frame: error {ret}")));
                }

                let sample_rate = u32::try_from((*self.frame).sample_rate).unwrap_or(0);
                let channels = u32::try_from((*self.frame).ch_layout.nb_channels).unwrap_or(0);
                let samples = u32::try_from((*self.frame).nb_samples).unwrap_or(0);
                let appended = self.append_s16(channels as usize, out);
                ff::av_frame_unref(self.frame);
                appended?;

                let previous = produced.map_or(0, |p| p.samples);
                produced = Some(DecodedOutput {
                    len: out.len() - start,
                    sample_rate,
                    channels,
                    samples: previous + samples,
                });
            }
        }
        Ok(produced)
    }

    fn reset(&mut self) {
        // SAFETY: the context is valid for the lifetime of self.
        unsafe {
            if !self.ctx.is_null() {
                ff::avcodec_flush_buffers(self.ctx);
            }
        }
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        // SAFETY: each pointer is either null or owned by self.
        unsafe {
            if !self.frame.is_null() {
                ff::av_frame_free(&mut self.frame);
            }
            if !self.packet.is_null() {
                ff::av_packet_free(&mut self.packet);
            }
            if !self.ctx.is_null() {
                ff::avcodec_free_context(&mut self.ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esframe_aac::AdtsHeader;
    use esframe_ac3::{Ac3FrameBuilder, Ac3Scanner};
    use esframe_core::FrameScanner;

    #[test]
    fn test_open_every_codec() {
        let engines: Vec<_> = AudioCodec::ALL
            .into_iter()
            .map(|codec| FfmpegEngine::new(codec).map_err(|e| format!("{codec}: {e}")))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(engines.len(), 4);
        assert!(BackendRegistry::global().is_loaded(FFMPEG_BACKEND));
        assert_eq!(engines[0].name(), "libavcodec");
    }

    #[test]
    fn test_garbage_frame_is_not_fatal() {
        let mut engine = FfmpegEngine::new(AudioCodec::Ac3).unwrap();
        let frame = Ac3FrameBuilder::ac3(0, 14).build();
        let desc = Ac3Scanner.scan(&frame).unwrap();
        match engine.decode(&frame, &desc, &mut Vec::new()) {
            Ok(_) => {}
            Err(e) => assert!(!e.is_fatal(), "{e}"),
        }
    }

    #[test]
    fn test_swapped_frame_is_staged_native() {
        let native = Ac3FrameBuilder::ac3(0, 14).build();
        let swapped = Ac3FrameBuilder::ac3(0, 14).swapped(true).build();
        let padding = ff::AV_INPUT_BUFFER_PADDING_SIZE as usize;

        let mut input = Vec::new();
        stage_input(&mut input, &swapped, SyncByteOrder::Swapped16);
        assert_eq!(input.len(), native.len() + padding);
        assert_eq!(&input[..native.len()], native.as_slice());
        assert_eq!(&input[..2], &[0x0B, 0x77]);
        assert!(input[native.len()..].iter().all(|&b| b == 0));

        stage_input(&mut input, &native, SyncByteOrder::Native);
        assert_eq!(&input[..native.len()], native.as_slice());
    }

    #[test]
    fn test_swapped_stream_decodes_like_native() {
        let native = Ac3FrameBuilder::ac3(0, 14).build();
        let swapped = Ac3FrameBuilder::ac3(0, 14).swapped(true).build();
        let native_desc = Ac3Scanner.scan(&native).unwrap();
        let swapped_desc = Ac3Scanner.scan(&swapped).unwrap();
        assert_eq!(swapped_desc.byte_order, SyncByteOrder::Swapped16);

        let mut a = FfmpegEngine::new(AudioCodec::Ac3).unwrap();
        let mut b = FfmpegEngine::new(AudioCodec::Ac3).unwrap();
        let (mut out_a, mut out_b) = (Vec::new(), Vec::new());
        let from_native = a.decode(&native, &native_desc, &mut out_a);
        let from_swapped = b.decode(&swapped, &swapped_desc, &mut out_b);
        assert_eq!(from_native.is_ok(), from_swapped.is_ok());
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_rejected_config_keeps_decoder_open() {
        let mut engine = FfmpegEngine::new(AudioCodec::Aac).unwrap();
        if let Err(e) = engine.configure(&[0x00, 0x00]) {
            assert!(!e.is_fatal(), "{e}");
        }
        // SAFETY: the context is owned by the engine.
        assert!(unsafe { ff::avcodec_is_open(engine.ctx) } > 0);

        let frame = AdtsHeader::new(64).build_frame();
        let desc = esframe_aac::AdtsScanner.scan(&frame).unwrap();
        if let Err(e) = engine.decode(&frame, &desc, &mut Vec::new()) {
            assert!(!e.is_fatal(), "{e}");
        }
    }
}
