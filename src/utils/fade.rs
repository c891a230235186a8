//! Power-preserving cross-fades for mode transitions and redundancy
//!
//! Blends always cover the 2.5 ms overlap region. The window is the
//! transform coder's overlap window sampled at 48 kHz; lower API rates
//! step through it. The squared window is used as the blend weight,
//! which keeps the fade power-complementary.

use once_cell::sync::Lazy;

/// Overlap window length: 2.5 ms at 48 kHz
const WINDOW_LEN: usize = 120;

const Q15_ONE: i32 = 32767;

/// Q15 overlap window, `sin(pi/2 * sin^2(pi/2 * (i + 0.5) / 120))`
static WINDOW: Lazy<[i16; WINDOW_LEN]> = Lazy::new(|| {
    let mut window = [0i16; WINDOW_LEN];
    for (i, w) in window.iter_mut().enumerate() {
        let x = std::f64::consts::FRAC_PI_2 * (i as f64 + 0.5) / WINDOW_LEN as f64;
        let inner = x.sin();
        let value = (std::f64::consts::FRAC_PI_2 * inner * inner).sin();
        *w = (value * 32767.0).round() as i16;
    }
    window
});

/// Squared-window blend weight for overlap sample `i` at rate `fs`
fn weight(i: usize, fs: u32) -> i32 {
    let inc = (48000 / fs) as usize;
    let w = i32::from(WINDOW[i * inc]);
    (w * w) >> 15
}

#[inline]
fn blend(fading_out: i16, fading_in: i16, w: i32) -> i16 {
    ((w * i32::from(fading_in) + (Q15_ONE - w) * i32::from(fading_out)) >> 15) as i16
}

/// Cross-fade where `out` holds the incoming signal and `prev` fades out
///
/// `out[i] = (1-w)*prev[i] + w*out[i]` over `overlap` samples per
/// channel of interleaved PCM.
pub fn fade_from(prev: &[i16], out: &mut [i16], overlap: usize, channels: usize, fs: u32) {
    for i in 0..overlap {
        let w = weight(i, fs);
        for c in 0..channels {
            let idx = i * channels + c;
            out[idx] = blend(prev[idx], out[idx], w);
        }
    }
}

/// Cross-fade where `out` fades out toward the incoming `next`
///
/// `out[i] = (1-w)*out[i] + w*next[i]` over `overlap` samples per
/// channel of interleaved PCM.
pub fn fade_to(out: &mut [i16], next: &[i16], overlap: usize, channels: usize, fs: u32) {
    for i in 0..overlap {
        let w = weight(i, fs);
        for c in 0..channels {
            let idx = i * channels + c;
            out[idx] = blend(out[idx], next[idx], w);
        }
    }
}
