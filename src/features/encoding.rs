//! Fixed time-domain encoding of one packet into a scalar.

use crate::intake::PacketMetadata;

const LENGTH_SCALE: f64 = 10.0;
const PROTOCOL_SCALE: f64 = 10.0;
const TIME_SCALE: f64 = 15.68;

/// `length·10 + protocol/10 − log2(timestamp)·15.68`
///
/// Non-positive timestamps give non-finite values; they are zeroed after the transform.
#[inline]
pub fn weight_transform(meta: &PacketMetadata) -> f64 {
    f64::from(meta.length) * LENGTH_SCALE + f64::from(meta.protocol) / PROTOCOL_SCALE
        - meta.timestamp.log2() * TIME_SCALE
}
