//! Uniform record types and fixed-stride record views.
//!
//! Every per-frame uniform region is an array of fixed-stride records,
//! addressed by the slot index the allocator assigned for the frame. The
//! [`RecordLayout`] expresses that addressing as a bounds-checked view over a
//! plain byte store, so the capacity rules are testable against an in-memory
//! buffer and the GPU path is the same arithmetic against mapped memory.

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::error::{ResourceError, ResourceResult};

/// Camera record: projection and view matrices.
///
/// Used both for the scene camera (one record) and the per-light shadow
/// cameras (`max_lights` records).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CameraRecord {
    /// Projection matrix.
    pub projection: Mat4,
    /// View matrix.
    pub view: Mat4,
}

impl CameraRecord {
    /// Size of one record in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(projection: Mat4, view: Mat4) -> Self {
        Self { projection, view }
    }

    /// Combined view-projection matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Per-object record: world transform and world-space bounding box.
///
/// The box corners are rewritten each frame by the geometry pass for
/// entities that carry a collision box; the hitbox shader expands them into
/// the wireframe.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ObjectRecord {
    /// Object-to-world transform.
    pub transform: Mat4,
    /// World-space AABB minimum (w unused).
    pub aabb_min: Vec4,
    /// World-space AABB maximum (w unused).
    pub aabb_max: Vec4,
}

impl ObjectRecord {
    /// Size of one record in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(transform: Mat4) -> Self {
        Self {
            transform,
            aabb_min: Vec4::ZERO,
            aabb_max: Vec4::ZERO,
        }
    }
}

/// Per-light shading record consumed by the lighting pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightRecord {
    /// Light position in world space (w = 1).
    pub position: Vec4,
    /// Light direction hint (w = 0).
    pub direction: Vec4,
    /// Light color (w = 1).
    pub color: Vec4,
    /// World-to-light-clip matrix for shadow lookups.
    pub light_matrix: Mat4,
    /// Inverse of the camera view-projection, for world-position
    /// reconstruction from depth.
    pub camera_inverse: Mat4,
}

impl LightRecord {
    /// Size of one record in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Fixed-stride array layout for `T` records in a byte store.
///
/// The stride is `size_of::<T>()` rounded up to the requested alignment, so
/// a layout built with the device's dynamic-offset alignment produces
/// offsets valid for descriptor binds.
#[derive(Clone, Copy, Debug)]
pub struct RecordLayout<T> {
    capacity: usize,
    stride: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> RecordLayout<T> {
    /// Layout with natural stride.
    pub fn new(capacity: usize) -> Self {
        Self::with_alignment(capacity, 1)
    }

    /// Layout whose stride is rounded up to `alignment` bytes.
    ///
    /// `alignment` of zero is treated as one.
    pub fn with_alignment(capacity: usize, alignment: usize) -> Self {
        let alignment = alignment.max(1);
        let stride = std::mem::size_of::<T>().div_ceil(alignment) * alignment;
        Self {
            capacity,
            stride,
            _marker: PhantomData,
        }
    }

    /// Number of records in the layout.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes between consecutive records.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Total bytes a backing store needs for this layout.
    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.capacity * self.stride
    }

    /// Byte offset of record `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::IndexOutOfRange`] past the capacity.
    pub fn byte_offset(&self, index: usize) -> ResourceResult<usize> {
        if index >= self.capacity {
            return Err(ResourceError::IndexOutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        Ok(index * self.stride)
    }

    /// Dynamic descriptor offset of record `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::IndexOutOfRange`] past the capacity.
    pub fn dynamic_offset(&self, index: usize) -> ResourceResult<u32> {
        Ok(self.byte_offset(index)? as u32)
    }

    /// Writes `record` at `index` in `store`.
    ///
    /// # Errors
    ///
    /// Returns an error when the index is out of range or the store is too
    /// small, never writing out of bounds.
    pub fn write(&self, store: &mut [u8], index: usize, record: &T) -> ResourceResult<()> {
        let offset = self.byte_offset(index)?;
        let end = offset + std::mem::size_of::<T>();
        if end > store.len() {
            return Err(ResourceError::StoreTooSmall {
                actual: store.len(),
                required: end,
            });
        }
        store[offset..end].copy_from_slice(bytemuck::bytes_of(record));
        Ok(())
    }

    /// Reads the record at `index` from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error when the index is out of range or the store is too
    /// small.
    pub fn read(&self, store: &[u8], index: usize) -> ResourceResult<T> {
        let offset = self.byte_offset(index)?;
        let end = offset + std::mem::size_of::<T>();
        if end > store.len() {
            return Err(ResourceError::StoreTooSmall {
                actual: store.len(),
                required: end,
            });
        }
        Ok(bytemuck::pod_read_unaligned(&store[offset..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_record_sizes() {
        assert_eq!(CameraRecord::SIZE, 128);
        assert_eq!(ObjectRecord::SIZE, 96);
        assert_eq!(LightRecord::SIZE, 176);
    }

    #[test]
    fn test_stride_alignment() {
        let natural = RecordLayout::<ObjectRecord>::new(4);
        assert_eq!(natural.stride(), 96);

        let aligned = RecordLayout::<ObjectRecord>::with_alignment(4, 256);
        assert_eq!(aligned.stride(), 256);
        assert_eq!(aligned.buffer_size(), 1024);

        // Alignment already satisfied leaves the stride untouched.
        let exact = RecordLayout::<CameraRecord>::with_alignment(2, 64);
        assert_eq!(exact.stride(), 128);
    }

    #[test]
    fn test_light_record_round_trip_at_boundaries() {
        const MAX_LIGHTS: usize = 8;
        let layout = RecordLayout::<LightRecord>::with_alignment(MAX_LIGHTS, 256);
        let mut store = vec![0u8; layout.buffer_size()];

        let record = LightRecord {
            position: Vec4::new(20.0, 35.0, 20.0, 1.0),
            direction: Vec4::new(0.0, -1.0, 0.0, 0.0),
            color: Vec4::new(1.0, 0.5, 0.75, 1.0),
            light_matrix: Mat4::from_translation(Vec3::splat(2.0)),
            camera_inverse: Mat4::from_rotation_y(0.3),
        };

        for index in [0, MAX_LIGHTS - 1] {
            layout.write(&mut store, index, &record).unwrap();
            let back = layout.read(&store, index).unwrap();
            assert_eq!(back, record);
        }
    }

    #[test]
    fn test_write_past_capacity_is_rejected() {
        let layout = RecordLayout::<LightRecord>::new(8);
        let mut store = vec![0u8; layout.buffer_size()];
        let record = LightRecord::default();

        let err = layout.write(&mut store, 8, &record).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::IndexOutOfRange {
                index: 8,
                capacity: 8
            }
        ));
        // The store is untouched by the failed write.
        assert!(store.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_small_store_is_rejected() {
        let layout = RecordLayout::<CameraRecord>::new(2);
        let mut store = vec![0u8; CameraRecord::SIZE];
        let record = CameraRecord::default();

        assert!(layout.write(&mut store, 0, &record).is_ok());
        assert!(matches!(
            layout.write(&mut store, 1, &record),
            Err(ResourceError::StoreTooSmall { .. })
        ));
    }

    #[test]
    fn test_view_projection() {
        let projection = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let record = CameraRecord::new(projection, view);
        assert_eq!(record.view_projection(), projection * view);
    }
}
