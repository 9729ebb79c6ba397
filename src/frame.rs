//! Wire format of the sample stream coming off the FPGA.
//!
//! Every frame is four bytes: `[SYNC][b0][b1][b2]`. The payload packs two
//! signed 12-bit samples, with the high nibble of `b2` extending `b0` and the
//! low nibble extending `b1`.

/// Reserved value that starts every frame
pub const SYNC_BYTE: u8 = 0xAA;
/// Bytes following the sync byte
pub const PAYLOAD_SIZE: usize = 3;
/// Raw bytes per frame on the wire
pub const FRAME_SIZE: usize = PAYLOAD_SIZE + 1;
pub const SAMPLE_MIN: i16 = -2048;
pub const SAMPLE_MAX: i16 = 2047;

pub type PayloadBytes = [u8; PAYLOAD_SIZE];
pub type FrameBytes = [u8; FRAME_SIZE];

/// One decoded frame: the raw ADC value and the filter output for the same instant
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct SamplePair {
    pub unfiltered: i16,
    pub filtered: i16,
}

impl SamplePair {
    pub fn new(unfiltered: i16, filtered: i16) -> Self {
        Self {
            unfiltered,
            filtered,
        }
    }
}

/// Reinterpret a 12-bit word as two's complement
fn sign_extend_12(word: u16) -> i16 {
    let value = word as i16;
    if value > SAMPLE_MAX {
        value - 4096
    } else {
        value
    }
}

/// Decode a 3-byte payload into its sample pair
pub fn unpack(payload: &PayloadBytes) -> SamplePair {
    let [b0, b1, b2] = *payload;
    let unfiltered = (((b2 & 0xF0) as u16) << 4) | b0 as u16;
    let filtered = (((b2 & 0x0F) as u16) << 8) | b1 as u16;
    SamplePair {
        unfiltered: sign_extend_12(unfiltered),
        filtered: sign_extend_12(filtered),
    }
}

/// Decode a full frame, returning `None` if it doesn't start with `sync`
pub fn decode_frame(frame: &FrameBytes, sync: u8) -> Option<SamplePair> {
    let [head, b0, b1, b2] = *frame;
    (head == sync).then(|| unpack(&[b0, b1, b2]))
}

/// Inverse of [`unpack`]. Values outside of the 12-bit range are truncated to their low 12 bits.
pub fn pack(pair: SamplePair) -> PayloadBytes {
    let unfiltered = pair.unfiltered as u16 & 0x0FFF;
    let filtered = pair.filtered as u16 & 0x0FFF;
    [
        (unfiltered & 0xFF) as u8,
        (filtered & 0xFF) as u8,
        (((unfiltered >> 8) as u8) << 4) | (filtered >> 8) as u8,
    ]
}

/// Build a complete frame for `pair`, as the hardware would send it
pub fn encode_frame(pair: SamplePair, sync: u8) -> FrameBytes {
    let [b0, b1, b2] = pack(pair);
    [sync, b0, b1, b2]
}
