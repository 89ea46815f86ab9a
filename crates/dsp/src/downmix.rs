// Stereo to centered mono, kept in a stereo layout

/// Bytes per interleaved 16-bit stereo frame.
pub const STEREO_FRAME_BYTES: usize = 4;

/// Replace each little-endian stereo frame with the mean of its channels, truncated toward zero.
///
/// Only the largest whole-frame prefix is touched; its length is returned so
/// the caller can write exactly that many bytes.
pub fn downmix_stereo_in_place(pcm: &mut [u8]) -> usize {
    let aligned = pcm.len() - pcm.len() % STEREO_FRAME_BYTES;
    for frame in pcm[..aligned].chunks_exact_mut(STEREO_FRAME_BYTES) {
        let left = i16::from_le_bytes([frame[0], frame[1]]) as f64;
        let right = i16::from_le_bytes([frame[2], frame[3]]) as f64;
        // Truncates toward zero
        let mono = (0.5 * left + 0.5 * right) as i16;
        let bytes = mono.to_le_bytes();
        frame[0] = bytes[0];
        frame[1] = bytes[1];
        frame[2] = bytes[0];
        frame[3] = bytes[1];
    }
    aligned
}
