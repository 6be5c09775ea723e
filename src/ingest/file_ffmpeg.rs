//! Local file frame source using FFmpeg.
//!
//! Decodes the best video stream of a local file into RGB24 frames, in
//! presentation order, entirely in memory.

use ffmpeg_next as ffmpeg;
use image::RgbImage;

use crate::error::{Result, ScanError};

pub(crate) struct FfmpegFileSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    total_frames: Option<u64>,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self> {
        let fail = |reason: String| ScanError::source_open(path, reason);

        ffmpeg::init().map_err(|e| fail(format!("initialize ffmpeg: {e}")))?;
        let input = ffmpeg::format::input(&path).map_err(|e| fail(format!("ffmpeg open: {e}")))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| fail("file has no video track".to_string()))?;
        let stream_index = input_stream.index();
        let frames = input_stream.frames();
        let total_frames = (frames > 0).then_some(frames as u64);

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| fail(format!("load video decoder parameters: {e}")))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| fail(format!("open ffmpeg video decoder: {e}")))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| fail(format!("create ffmpeg scaler: {e}")))?;

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            total_frames,
            eof_sent: false,
        })
    }

    pub(crate) fn next_frame(&mut self) -> std::result::Result<Option<RgbImage>, String> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut rgb_frame)
                    .map_err(|e| format!("scale frame to RGB: {e}"))?;
                return frame_to_image(&rgb_frame).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }
            match self.next_packet() {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .map_err(|e| format!("send packet to ffmpeg decoder: {e}"))?,
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| format!("flush ffmpeg decoder: {e}"))?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        self.input
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet)
    }

    pub(crate) fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }
}

fn frame_to_image(frame: &ffmpeg::frame::Video) -> std::result::Result<RgbImage, String> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let pixels = if stride == row_bytes {
        data.get(..row_bytes * height as usize)
            .ok_or_else(|| "ffmpeg frame is shorter than its dimensions".to_string())?
            .to_vec()
    } else {
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            pixels.extend_from_slice(
                data.get(start..start + row_bytes)
                    .ok_or_else(|| "ffmpeg frame row is out of bounds".to_string())?,
            );
        }
        pixels
    };

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| "ffmpeg frame buffer does not match its dimensions".to_string())
}
