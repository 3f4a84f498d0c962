//! Indexed mesh storage on top of two [`ContinuousBuffer`]s.
//!
//! Every piece of geometry occupies one vertex range and one index range.
//! Indices are relative to the geometry's own first vertex, so a draw call
//! needs the index range plus a base vertex (see [`RenderParameters`]).

use std::fmt;

use glam::{Vec2, Vec3};
use tracing::trace;

use crate::buffer::{ContinuousBuffer, Handle};
use crate::error::{BufferError, GeometryError, GeometryResult};

/// One vertex of a mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    /// A vertex with only a position.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

/// Identifies one piece of geometry in a [`GeometryStore`].
///
/// Packs the vertex buffer handle into the upper 32 bits and the index
/// buffer handle into the lower 32 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(u64);

impl Slot {
    fn from_handles(vertices: Handle, indices: Handle) -> Self {
        Self((u64::from(vertices.raw()) << 32) | u64::from(indices.raw()))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    fn vertex_handle(self) -> Handle {
        Handle::from_raw((self.0 >> 32) as u32)
    }

    fn index_handle(self) -> Handle {
        Handle::from_raw(self.0 as u32)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot({}, {})", self.vertex_handle(), self.index_handle())
    }
}

/// What a draw call needs to render one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderParameters {
    /// Offset of the first index in [`GeometryStore::indices`].
    pub first_index: usize,
    pub index_count: usize,
    /// Offset of the first vertex in [`GeometryStore::vertices`], to be
    /// added to every index.
    pub first_vertex: usize,
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Contains nothing; including any point makes it valid.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut bounds, point| {
            bounds.include_point(point);
            bounds
        })
    }

    pub fn include_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// `false` for [`Aabb::EMPTY`].
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the size along each axis.
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Vertex and index storage for all renderable geometry.
#[derive(Debug, Default)]
pub struct GeometryStore {
    vertices: ContinuousBuffer<MeshVertex>,
    indices: ContinuousBuffer<u32>,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with the given initial buffer sizes, in elements.
    pub fn with_capacity(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            vertices: ContinuousBuffer::new(vertex_capacity),
            indices: ContinuousBuffer::new(index_capacity),
        }
    }

    /// Store a new piece of geometry.
    pub fn allocate_slot(
        &mut self,
        vertices: &[MeshVertex],
        indices: &[u32],
    ) -> GeometryResult<Slot> {
        check_not_empty(vertices, indices)?;

        let vertex_handle = self.vertices.allocate(vertices.len())?;
        self.vertices.set_data(vertex_handle, vertices)?;

        let index_handle = match self.allocate_indices(indices) {
            Ok(handle) => handle,
            Err(err) => {
                self.vertices.deallocate(vertex_handle)?;
                return Err(err.into());
            }
        };

        let slot = Slot::from_handles(vertex_handle, index_handle);
        trace!(
            slot = %slot,
            vertices = vertices.len(),
            indices = indices.len(),
            "allocated geometry slot"
        );
        Ok(slot)
    }

    /// Replace the data of a slot. The element counts must not change.
    pub fn update_data(
        &mut self,
        slot: Slot,
        vertices: &[MeshVertex],
        indices: &[u32],
    ) -> GeometryResult<()> {
        check_not_empty(vertices, indices)?;

        // Validate both sides before writing either.
        check_size(self.vertices.size(slot.vertex_handle())?, vertices.len())?;
        check_size(self.indices.size(slot.index_handle())?, indices.len())?;

        self.vertices.set_data(slot.vertex_handle(), vertices)?;
        self.indices.set_data(slot.index_handle(), indices)?;
        Ok(())
    }

    /// Release a slot.
    pub fn deallocate_slot(&mut self, slot: Slot) -> GeometryResult<()> {
        // Both handles are checked first so a bad slot releases nothing.
        self.vertices.size(slot.vertex_handle())?;
        self.indices.size(slot.index_handle())?;

        self.vertices.deallocate(slot.vertex_handle())?;
        self.indices.deallocate(slot.index_handle())?;
        trace!(slot = %slot, "released geometry slot");
        Ok(())
    }

    pub fn render_parameters(&self, slot: Slot) -> GeometryResult<RenderParameters> {
        let index_handle = slot.index_handle();
        Ok(RenderParameters {
            first_index: self.indices.offset(index_handle)?,
            index_count: self.indices.size(index_handle)?,
            first_vertex: self.vertices.offset(slot.vertex_handle())?,
        })
    }

    /// Bounds of the vertices of a slot.
    pub fn bounds(&self, slot: Slot) -> GeometryResult<Aabb> {
        let vertices = self.vertices.slice(slot.vertex_handle())?;
        Ok(Aabb::from_points(vertices.iter().map(|vertex| vertex.position)))
    }

    /// The whole vertex buffer.
    pub fn vertices(&self) -> &[MeshVertex] {
        self.vertices.data()
    }

    /// The whole index buffer.
    pub fn indices(&self) -> &[u32] {
        self.indices.data()
    }

    fn allocate_indices(&mut self, indices: &[u32]) -> Result<Handle, BufferError> {
        let handle = self.indices.allocate(indices.len())?;
        self.indices.set_data(handle, indices)?;
        Ok(handle)
    }
}

fn check_not_empty(vertices: &[MeshVertex], indices: &[u32]) -> GeometryResult<()> {
    if vertices.is_empty() || indices.is_empty() {
        return Err(GeometryError::EmptyGeometry {
            vertices: vertices.len(),
            indices: indices.len(),
        });
    }
    Ok(())
}

fn check_size(expected: usize, actual: usize) -> GeometryResult<()> {
    if expected != actual {
        return Err(BufferError::SizeMismatch { expected, actual }.into());
    }
    Ok(())
}
