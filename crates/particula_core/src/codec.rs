//! # State Codec
//!
//! Flat, versionless checkpoint layout for instancers and registries.
//!
//! ## Layout
//!
//! ```text
//! instancer:  id group count | origin(3) | position(count*3) | velocity(count*3)
//!             | orientation(count*4) | scale(count*3) | prototype_index(count)
//!
//! registry:   n | ids(n) | groups(n) | counts(n) | instancer_0 .. instancer_{n-1}
//! ```
//!
//! Only `count` and `n` are carried explicitly; every other width is derived.
//! Values are `f64`: every integer slot round-trips exactly, and positions
//! are written in the absolute frame (`origin + relative`).
//!
//! Integer slots are rounded on decode. Negative, non-finite or out-of-range
//! values are rejected with [`ParticleError::InvalidScalar`]; a stream that
//! ends before a derived width is satisfied fails with
//! [`ParticleError::StreamTooShort`].

use crate::buffer::{Frame, InstancerId, ParticleBuffer, ParticleField, ParticleGroup, Quat, Vec3};
use crate::error::{ParticleError, ParticleResult};
use crate::manifest::{Manifest, ManifestEntry};
use crate::registry::InstancerRegistry;

/// Scalars in an instancer header: id, group, count.
pub const HEADER_LEN: usize = 3;

/// Scalars used by the origin.
pub const ORIGIN_LEN: usize = 3;

/// Scalars per particle: position 3, velocity 3, orientation 4, scale 3,
/// prototype index 1.
pub const PARTICLE_STRIDE: usize = 14;

/// Number of scalars an instancer of `count` particles occupies.
#[inline]
#[must_use]
pub const fn instancer_state_size(count: usize) -> usize {
    HEADER_LEN + ORIGIN_LEN + PARTICLE_STRIDE * count
}

/// Number of scalars [`encode_registry`] produces for `registry`.
#[must_use]
pub fn registry_state_size<H>(registry: &InstancerRegistry<H>) -> usize {
    1 + 3 * registry.len()
        + registry
            .iter()
            .map(ParticleBuffer::state_size)
            .sum::<usize>()
}

/// Appends scalars to a stream.
struct StateWriter<'a> {
    stream: &'a mut Vec<f64>,
}

impl<'a> StateWriter<'a> {
    fn new(stream: &'a mut Vec<f64>) -> Self {
        Self { stream }
    }

    #[inline]
    fn write_u32(&mut self, value: u32) {
        self.stream.push(f64::from(value));
    }

    #[inline]
    #[allow(clippy::cast_precision_loss)]
    fn write_len(&mut self, value: usize) {
        self.stream.push(value as f64);
    }

    #[inline]
    fn write_f32s(&mut self, values: &[f32]) {
        self.stream.extend(values.iter().map(|&v| f64::from(v)));
    }

    fn write_instancer(&mut self, buffer: &ParticleBuffer) {
        let origin = buffer.origin();

        self.write_u32(buffer.id());
        self.write_u32(buffer.group());
        self.write_len(buffer.count());
        self.write_f32s(&origin);

        for p in buffer.relative_positions() {
            self.stream
                .extend(p.iter().zip(&origin).map(|(&r, &o)| f64::from(r) + f64::from(o)));
        }
        self.write_f32s(bytemuck::cast_slice::<Vec3, f32>(buffer.velocities()));
        self.write_f32s(bytemuck::cast_slice::<Quat, f32>(&buffer.orientations()));
        self.write_f32s(bytemuck::cast_slice::<Vec3, f32>(&buffer.scales()));
        for &index in buffer.prototype_indices().iter() {
            self.write_u32(index);
        }
    }
}

/// Reads scalars from a stream, tracking how many were consumed.
struct StateReader<'a> {
    stream: &'a [f64],
    position: usize,
}

impl<'a> StateReader<'a> {
    const fn new(stream: &'a [f64]) -> Self {
        Self { stream, position: 0 }
    }

    #[inline]
    const fn position(&self) -> usize {
        self.position
    }

    #[inline]
    const fn remaining(&self) -> usize {
        self.stream.len() - self.position
    }

    fn ensure(&self, needed: usize) -> ParticleResult<()> {
        if needed > self.remaining() {
            return Err(ParticleError::StreamTooShort {
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> ParticleResult<&'a [f64]> {
        self.ensure(n)?;
        let slice = &self.stream[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    fn read_u32(&mut self, field: &'static str) -> ParticleResult<u32> {
        let value = self.take(1)?[0];
        to_u32(field, value)
    }

    fn read_len(&mut self, field: &'static str) -> ParticleResult<usize> {
        let value = self.take(1)?[0];
        to_len(field, value)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_f32s<const N: usize>(&mut self, n: usize) -> ParticleResult<Vec<[f32; N]>> {
        let values = self.take(n * N)?;
        Ok(values
            .chunks_exact(N)
            .map(|chunk| std::array::from_fn(|i| chunk[i] as f32))
            .collect())
    }

    fn read_header(&mut self) -> ParticleResult<(InstancerId, ParticleGroup, usize)> {
        let id = self.read_u32("id")?;
        let group = self.read_u32("group")?;
        let count = self.read_len("count")?;
        Ok((id, group, count))
    }

    /// Reads everything after the header.
    #[allow(clippy::cast_possible_truncation)]
    fn read_body(
        &mut self,
        id: InstancerId,
        group: ParticleGroup,
        count: usize,
    ) -> ParticleResult<ParticleBuffer> {
        // Check the whole body up front so a corrupt count cannot drive
        // a huge allocation.
        let needed = count
            .checked_mul(PARTICLE_STRIDE)
            .and_then(|n| n.checked_add(ORIGIN_LEN))
            .unwrap_or(usize::MAX);
        self.ensure(needed)?;

        let raw = self.take(ORIGIN_LEN)?;
        let origin: Vec3 = std::array::from_fn(|axis| raw[axis] as f32);

        let absolute = self.take(count * 3)?;
        let relative: Vec<Vec3> = absolute
            .chunks_exact(3)
            .map(|p| std::array::from_fn(|axis| (p[axis] - f64::from(origin[axis])) as f32))
            .collect();
        let velocities = self.read_f32s::<3>(count)?;
        let orientations = self.read_f32s::<4>(count)?;
        let scales = self.read_f32s::<3>(count)?;
        let prototypes = self
            .take(count)?
            .iter()
            .map(|&v| to_u32("prototype_index", v))
            .collect::<ParticleResult<Vec<u32>>>()?;

        let mut buffer = ParticleBuffer::zeroed(id, group, count);
        buffer.set_origin(origin);
        buffer.set_positions(&relative, Frame::Relative)?;
        buffer.set_velocities(&velocities)?;
        buffer.set_orientations(&orientations)?;
        buffer.set_scales(&scales)?;
        buffer.set_prototype_indices(&prototypes)?;
        Ok(buffer)
    }
}

/// Rounds an integer slot, rejecting values no `u32` can represent.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u32(field: &'static str, value: f64) -> ParticleResult<u32> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 0.0 || rounded > f64::from(u32::MAX) {
        return Err(ParticleError::InvalidScalar { field, value });
    }
    Ok(rounded as u32)
}

fn to_len(field: &'static str, value: f64) -> ParticleResult<usize> {
    let rounded = to_u32(field, value)?;
    usize::try_from(rounded).map_err(|_| ParticleError::InvalidScalar { field, value })
}

/// Encodes one instancer.
#[must_use]
pub fn encode_instancer(buffer: &ParticleBuffer) -> Vec<f64> {
    let mut stream = Vec::with_capacity(buffer.state_size());
    encode_instancer_into(buffer, &mut stream);
    stream
}

/// Appends the encoding of one instancer to `stream`.
pub fn encode_instancer_into(buffer: &ParticleBuffer, stream: &mut Vec<f64>) {
    stream.reserve(buffer.state_size());
    StateWriter::new(stream).write_instancer(buffer);
}

/// Decodes one instancer from the front of `stream`.
///
/// Returns the buffer and the number of scalars consumed, so the caller can
/// advance through a concatenated stream.
///
/// # Errors
///
/// - [`ParticleError::StreamTooShort`] if the stream is truncated
/// - [`ParticleError::InvalidScalar`] if an integer slot is malformed
pub fn decode_instancer(stream: &[f64]) -> ParticleResult<(ParticleBuffer, usize)> {
    let mut reader = StateReader::new(stream);
    let (id, group, count) = reader.read_header()?;
    let buffer = reader.read_body(id, group, count)?;
    Ok((buffer, reader.position()))
}

/// Decodes one instancer from the front of `stream` into `target`.
///
/// The stream's `(id, group)` must name `target`, and its count must equal
/// the target's. Visibility is not part of the layout and is kept.
///
/// # Errors
///
/// - [`ParticleError::IdentityMismatch`] if the stream is for another instancer
/// - [`ParticleError::ShapeMismatch`] if the counts differ
/// - [`ParticleError::StreamTooShort`] / [`ParticleError::InvalidScalar`]
///   for a malformed stream
///
/// On error `target` is unchanged.
pub fn decode_instancer_into(stream: &[f64], target: &mut ParticleBuffer) -> ParticleResult<usize> {
    let mut reader = StateReader::new(stream);
    let (id, group, count) = reader.read_header()?;
    if id != target.id() || group != target.group() {
        return Err(ParticleError::IdentityMismatch {
            expected_id: target.id(),
            expected_group: target.group(),
            found_id: id,
            found_group: group,
        });
    }
    if count != target.count() {
        return Err(ParticleError::ShapeMismatch {
            field: ParticleField::Position,
            expected: target.count(),
            actual: count,
        });
    }

    let decoded = reader.read_body(id, group, count)?;
    target.assign_from(&decoded)?;
    Ok(reader.position())
}

/// Encodes a whole registry: the manifest header, then every instancer in
/// iteration order.
#[must_use]
pub fn encode_registry<H>(registry: &InstancerRegistry<H>) -> Vec<f64> {
    let mut stream = Vec::with_capacity(registry_state_size(registry));
    let mut writer = StateWriter::new(&mut stream);

    writer.write_len(registry.len());
    for buffer in registry.iter() {
        writer.write_u32(buffer.id());
    }
    for buffer in registry.iter() {
        writer.write_u32(buffer.group());
    }
    for buffer in registry.iter() {
        writer.write_len(buffer.count());
    }
    for buffer in registry.iter() {
        writer.write_instancer(buffer);
    }

    stream
}

/// Decodes the registry header into a manifest.
///
/// Returns the manifest and the number of scalars consumed.
///
/// # Errors
///
/// - [`ParticleError::StreamTooShort`] if the header is truncated
/// - [`ParticleError::InvalidScalar`] if a header slot is malformed
pub fn decode_manifest(stream: &[f64]) -> ParticleResult<(Manifest, usize)> {
    let mut reader = StateReader::new(stream);
    let n = reader.read_len("instancer_count")?;

    let ids = reader.take(n)?;
    let groups = reader.take(n)?;
    let counts = reader.take(n)?;

    let manifest = ids
        .iter()
        .zip(groups)
        .zip(counts)
        .map(|((&id, &group), &count)| -> ParticleResult<ManifestEntry> {
            Ok(ManifestEntry::new(
                to_u32("id", id)?,
                to_u32("group", group)?,
                to_len("count", count)?,
            ))
        })
        .collect::<ParticleResult<Manifest>>()?;

    Ok((manifest, reader.position()))
}

/// Decodes the per-instancer payloads that follow a registry header.
///
/// `registry` must already match `manifest` (see
/// [`crate::sync::SyncEngine::reconcile`]). Payloads are consumed in
/// manifest order with a single cursor.
///
/// # Errors
///
/// - [`ParticleError::NotFound`] if a manifest id is not registered
/// - any error of [`decode_instancer_into`]
///
/// Instancers before the failing one keep their decoded state.
pub fn decode_payloads<H>(
    stream: &[f64],
    manifest: &Manifest,
    registry: &mut InstancerRegistry<H>,
) -> ParticleResult<usize> {
    let mut offset = 0;
    for entry in manifest.iter() {
        let target = registry
            .get_mut(entry.id)
            .ok_or(ParticleError::NotFound(entry.id))?;
        offset += decode_instancer_into(&stream[offset..], target)?;
    }
    Ok(offset)
}

/// Decodes a whole registry stream.
///
/// Reads the header, hands the manifest to `reconcile` so the registry's
/// shape matches before any payload is read, then decodes the payloads.
/// Returns the manifest and the total number of scalars consumed.
///
/// # Errors
///
/// Any error of [`decode_manifest`], `reconcile` or [`decode_payloads`].
pub fn decode_registry<H, R>(
    stream: &[f64],
    registry: &mut InstancerRegistry<H>,
    reconcile: R,
) -> ParticleResult<(Manifest, usize)>
where
    R: FnOnce(&Manifest, &mut InstancerRegistry<H>) -> ParticleResult<()>,
{
    let (manifest, header_len) = decode_manifest(stream)?;
    reconcile(&manifest, registry)?;
    let payload_len = decode_payloads(&stream[header_len..], &manifest, registry)?;
    Ok((manifest, header_len + payload_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::IDENTITY_ORIENTATION;

    fn sample_buffer() -> ParticleBuffer {
        let mut buffer = ParticleBuffer::zeroed(4, 2, 2);
        buffer.set_origin([10.0, -5.0, 0.5]);
        buffer
            .set_positions(&[[1.0, 2.0, 3.0], [-0.25, 0.0, 8.0]], Frame::Relative)
            .unwrap();
        buffer.set_velocities(&[[0.0, -9.8, 0.0], [1.0, 1.0, 1.0]]).unwrap();
        buffer
            .set_orientations(&[IDENTITY_ORIENTATION, [0.0, 1.0, 0.0, 0.0]])
            .unwrap();
        buffer.set_scales(&[[0.5; 3], [2.0, 1.0, 1.0]]).unwrap();
        buffer.set_prototype_indices(&[0, 3]).unwrap();
        buffer
    }

    #[test]
    fn test_state_size_formula() {
        assert_eq!(instancer_state_size(0), 6);
        assert_eq!(instancer_state_size(3), 48);
        assert_eq!(encode_instancer(&sample_buffer()).len(), instancer_state_size(2));
    }

    #[test]
    fn test_instancer_layout() {
        let stream = encode_instancer(&sample_buffer());

        assert_eq!(&stream[..6], &[4.0, 2.0, 2.0, 10.0, -5.0, 0.5]);
        // Positions are absolute
        assert_eq!(&stream[6..12], &[11.0, -3.0, 3.5, 9.75, -5.0, 8.5]);
        assert_eq!(&stream[12..18], &[0.0, f64::from(-9.8f32), 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(&stream[18..26], &[0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(&stream[26..32], &[0.5, 0.5, 0.5, 2.0, 1.0, 1.0]);
        assert_eq!(&stream[32..], &[0.0, 3.0]);
    }

    #[test]
    fn test_instancer_round_trip() {
        let original = sample_buffer();
        let mut stream = encode_instancer(&original);
        stream.extend_from_slice(&[99.0, 98.0]);

        let (decoded, used) = decode_instancer(&stream).unwrap();
        assert_eq!(used, original.state_size());
        assert_eq!(decoded, original);
        assert_eq!(decoded.relative_positions(), original.relative_positions());
    }

    #[test]
    fn test_decode_into_rejects_other_instancer() {
        let source = ParticleBuffer::zeroed(3, 0, 2);
        let stream = encode_instancer(&source);

        let mut target = ParticleBuffer::zeroed(5, 0, 2);
        target.set_origin([1.0, 1.0, 1.0]);
        let before = target.clone();

        let err = decode_instancer_into(&stream, &mut target).unwrap_err();
        assert_eq!(
            err,
            ParticleError::IdentityMismatch {
                expected_id: 5,
                expected_group: 0,
                found_id: 3,
                found_group: 0,
            }
        );
        assert_eq!(target, before);
    }

    #[test]
    fn test_decode_into_rejects_other_count() {
        let stream = encode_instancer(&ParticleBuffer::zeroed(5, 0, 3));
        let mut target = ParticleBuffer::zeroed(5, 0, 2);

        assert!(matches!(
            decode_instancer_into(&stream, &mut target),
            Err(ParticleError::ShapeMismatch {
                field: ParticleField::Position,
                expected: 2,
                actual: 3,
            })
        ));
    }

    #[test]
    fn test_decode_into_keeps_visibility() {
        let stream = encode_instancer(&sample_buffer());
        let mut target = ParticleBuffer::zeroed(4, 2, 2);
        target.set_visibilities(&[false, true]).unwrap();

        let used = decode_instancer_into(&stream, &mut target).unwrap();

        assert_eq!(used, stream.len());
        assert_eq!(target.prototype_indices().as_ref(), &[0, 3]);
        assert_eq!(target.visibilities().as_ref(), &[false, true]);
    }

    #[test]
    fn test_truncated_stream() {
        let stream = encode_instancer(&sample_buffer());

        assert!(matches!(
            decode_instancer(&stream[..stream.len() - 1]),
            Err(ParticleError::StreamTooShort { needed: 31, available: 30 })
        ));
        assert!(matches!(
            decode_instancer(&stream[..2]),
            Err(ParticleError::StreamTooShort { needed: 1, available: 0 })
        ));
    }

    #[test]
    fn test_huge_count_does_not_allocate() {
        let stream = [1.0, 0.0, f64::from(u32::MAX), 0.0, 0.0, 0.0];
        assert!(matches!(
            decode_instancer(&stream),
            Err(ParticleError::StreamTooShort { available: 3, .. })
        ));
    }

    #[test]
    fn test_invalid_integer_slots() {
        assert!(matches!(
            decode_instancer(&[-1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            Err(ParticleError::InvalidScalar { field: "id", .. })
        ));
        assert!(matches!(
            decode_instancer(&[1.0, f64::NAN, 0.0, 0.0, 0.0, 0.0]),
            Err(ParticleError::InvalidScalar { field: "group", .. })
        ));
        assert!(matches!(
            decode_manifest(&[f64::INFINITY]),
            Err(ParticleError::InvalidScalar { field: "instancer_count", .. })
        ));
    }

    #[test]
    fn test_integer_slots_are_rounded() {
        let stream = [7.000_000_1, 0.999_999_9, 0.0, 0.0, 0.0, 0.0];
        let (buffer, _) = decode_instancer(&stream).unwrap();
        assert_eq!((buffer.id(), buffer.group()), (7, 1));
    }

    #[test]
    fn test_registry_layout() {
        let mut registry = InstancerRegistry::new();
        registry.insert(ParticleBuffer::zeroed(1, 0, 3), ()).unwrap();
        registry.insert(ParticleBuffer::zeroed(2, 1, 0), ()).unwrap();

        let stream = encode_registry(&registry);

        assert_eq!(stream.len(), registry_state_size(&registry));
        assert_eq!(stream.len(), 7 + 48 + 6);
        assert_eq!(&stream[..7], &[2.0, 1.0, 2.0, 0.0, 1.0, 3.0, 0.0]);

        let id1 = &stream[7..55];
        assert_eq!(&id1[..6], &[1.0, 0.0, 3.0, 0.0, 0.0, 0.0]);
        assert!(id1[6..24].iter().all(|&v| v == 0.0));
        assert_eq!(&id1[24..28], &[0.0, 0.0, 0.0, 1.0]);
        assert!(id1[36..45].iter().all(|&v| v == 1.0));
        assert!(id1[45..].iter().all(|&v| v == 0.0));

        assert_eq!(&stream[55..], &[2.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_decode_manifest() {
        let stream = [2.0, 1.0, 2.0, 0.0, 1.0, 3.0, 0.0, 42.0];
        let (manifest, used) = decode_manifest(&stream).unwrap();

        assert_eq!(used, 7);
        assert_eq!(
            manifest.entries(),
            &[ManifestEntry::new(1, 0, 3), ManifestEntry::new(2, 1, 0)]
        );
        assert!(matches!(
            decode_manifest(&stream[..5]),
            Err(ParticleError::StreamTooShort { needed: 2, available: 0 })
        ));
    }

    #[test]
    fn test_decode_payloads_requires_registered_ids() {
        let manifest = Manifest::new(vec![ManifestEntry::new(9, 0, 0)]);
        let stream = encode_instancer(&ParticleBuffer::zeroed(9, 0, 0));
        let mut registry = InstancerRegistry::<()>::new();

        assert_eq!(
            decode_payloads(&stream, &manifest, &mut registry),
            Err(ParticleError::NotFound(9))
        );
    }

    #[test]
    fn test_decode_registry_reconciles_before_payloads() {
        let mut source = InstancerRegistry::new();
        source.insert(sample_buffer(), ()).unwrap();
        source.insert(ParticleBuffer::zeroed(0, 1, 0), ()).unwrap();
        let stream = encode_registry(&source);

        let mut target = InstancerRegistry::new();
        let (manifest, used) = decode_registry(&stream, &mut target, |manifest, registry| {
            for entry in manifest.iter() {
                registry.insert(ParticleBuffer::zeroed(entry.id, entry.group, entry.count), ())?;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(used, stream.len());
        assert_eq!(manifest, source.manifest());
        assert_eq!(target.get(4), source.get(4));
        assert_eq!(target.ids(), vec![4, 0]);
    }
}
