use crate::device::{
    BufferHandle, COLOR_SLOT, Device, DeviceError, POSITION_SLOT, VertexArrayHandle,
};

/// Floats per vertex for both positions and colors.
pub const COMPONENTS_PER_VERTEX: u32 = 3;

/// Errors from mesh construction.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("mesh has no vertices")]
    Empty,
    #[error("{len} floats is not a whole number of 3-component vertices")]
    PartialVertex { len: usize },
    #[error("color data describes {colors} vertices but positions describe {positions}")]
    MismatchedVertexCount { positions: usize, colors: usize },
    #[error("{floats} floats exceeds the addressable vertex count")]
    TooManyVertices { floats: usize },
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Device-resident geometry: one vertex array plus one static buffer per
/// attribute.
///
/// A mesh exclusively owns its handles. It is not `Clone`; release it with
/// [`Mesh::destroy`], which consumes it, so the handles are freed exactly once.
#[derive(Debug)]
pub struct Mesh {
    handles: Option<MeshHandles>,
    vertex_count: u32,
}

#[derive(Debug)]
struct MeshHandles {
    vertex_array: VertexArrayHandle,
    positions: BufferHandle,
    colors: Option<BufferHandle>,
}

impl Mesh {
    /// Upload positions (and optionally per-vertex colors) as a triangle list.
    ///
    /// Attribute slot 0 receives positions and slot 1 colors, both as three
    /// floats per vertex. The vertex count is `size_of_val(positions) /
    /// size_of::<f32>() / 3`.
    pub fn new<D: Device + ?Sized>(
        device: &mut D,
        positions: &[f32],
        colors: Option<&[f32]>,
    ) -> Result<Self, MeshError> {
        let vertex_count = vertex_count_of(positions)?;
        if let Some(colors) = colors {
            if colors.len() != positions.len() {
                return Err(MeshError::MismatchedVertexCount {
                    positions: vertex_count as usize,
                    colors: colors.len() / COMPONENTS_PER_VERTEX as usize,
                });
            }
        }

        let vertex_array = device.create_vertex_array()?;
        match upload(device, vertex_array, positions, colors) {
            Ok((positions, colors)) => {
                tracing::debug!(
                    vertex_array = vertex_array.0,
                    vertex_count,
                    colored = colors.is_some(),
                    "mesh uploaded"
                );
                Ok(Mesh {
                    handles: Some(MeshHandles {
                        vertex_array,
                        positions,
                        colors,
                    }),
                    vertex_count,
                })
            }
            Err((allocated, err)) => {
                for buffer in allocated {
                    device.delete_buffer(buffer);
                }
                device.delete_vertex_array(vertex_array);
                Err(err.into())
            }
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn has_colors(&self) -> bool {
        self.handles.as_ref().is_some_and(|h| h.colors.is_some())
    }

    pub fn vertex_array(&self) -> Option<VertexArrayHandle> {
        self.handles.as_ref().map(|h| h.vertex_array)
    }

    pub fn bind<D: Device + ?Sized>(&self, device: &mut D) {
        device.bind_vertex_array(self.vertex_array());
    }

    pub fn unbind<D: Device + ?Sized>(&self, device: &mut D) {
        device.bind_vertex_array(None);
    }

    /// Bind, draw every vertex as a triangle list, unbind.
    pub fn draw<D: Device + ?Sized>(&self, device: &mut D) {
        self.bind(device);
        device.draw_triangles(0, self.vertex_count);
        self.unbind(device);
    }

    /// Release the buffers and the vertex array.
    pub fn destroy<D: Device + ?Sized>(mut self, device: &mut D) {
        if let Some(handles) = self.handles.take() {
            device.delete_buffer(handles.positions);
            if let Some(colors) = handles.colors {
                device.delete_buffer(colors);
            }
            device.delete_vertex_array(handles.vertex_array);
            tracing::debug!(vertex_array = handles.vertex_array.0, "mesh released");
        }
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        if let Some(handles) = &self.handles {
            tracing::warn!(
                vertex_array = handles.vertex_array.0,
                "mesh dropped without destroy; device buffers leaked"
            );
        }
    }
}

fn vertex_count_of(positions: &[f32]) -> Result<u32, MeshError> {
    if positions.is_empty() {
        return Err(MeshError::Empty);
    }
    let byte_size = std::mem::size_of_val(positions);
    vertex_count_from_floats(byte_size / std::mem::size_of::<f32>())
}

fn vertex_count_from_floats(floats: usize) -> Result<u32, MeshError> {
    if floats % COMPONENTS_PER_VERTEX as usize != 0 {
        return Err(MeshError::PartialVertex { len: floats });
    }
    u32::try_from(floats / COMPONENTS_PER_VERTEX as usize)
        .map_err(|_| MeshError::TooManyVertices { floats })
}

type Uploaded = (BufferHandle, Option<BufferHandle>);

fn upload<D: Device + ?Sized>(
    device: &mut D,
    vertex_array: VertexArrayHandle,
    positions: &[f32],
    colors: Option<&[f32]>,
) -> Result<Uploaded, (Vec<BufferHandle>, DeviceError)> {
    let mut allocated = Vec::new();

    let position_buffer = device
        .create_static_buffer(positions)
        .map_err(|e| (allocated.clone(), e))?;
    allocated.push(position_buffer);
    device
        .set_vertex_attribute(
            vertex_array,
            POSITION_SLOT,
            position_buffer,
            COMPONENTS_PER_VERTEX,
        )
        .map_err(|e| (allocated.clone(), e))?;

    let color_buffer = match colors {
        Some(colors) => {
            let buffer = device
                .create_static_buffer(colors)
                .map_err(|e| (allocated.clone(), e))?;
            allocated.push(buffer);
            device
                .set_vertex_attribute(vertex_array, COLOR_SLOT, buffer, COMPONENTS_PER_VERTEX)
                .map_err(|e| (allocated.clone(), e))?;
            Some(buffer)
        }
        None => None,
    };

    Ok((position_buffer, color_buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Command, RecordingDevice};

    const TRIANGLE: [f32; 9] = [-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0, 0.0];
    const RED: [f32; 9] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

    #[test]
    fn vertex_count_is_floats_over_three() {
        let mut device = RecordingDevice::new();
        let positions = [0.5_f32; 36];
        let mesh = Mesh::new(&mut device, &positions, None).unwrap();
        assert_eq!(mesh.vertex_count(), 12);
        assert!(!mesh.has_colors());
        mesh.destroy(&mut device);
    }

    #[test]
    fn attributes_land_in_their_slots() {
        let mut device = RecordingDevice::new();
        let mesh = Mesh::new(&mut device, &TRIANGLE, Some(&RED)).unwrap();
        let vao = mesh.vertex_array().unwrap();

        assert_eq!(device.attribute_data(vao, POSITION_SLOT), Some((&TRIANGLE[..], 3)));
        assert_eq!(device.attribute_data(vao, COLOR_SLOT), Some((&RED[..], 3)));
        assert!(mesh.has_colors());
        mesh.destroy(&mut device);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn vertex_count_beyond_u32_is_rejected_before_any_device_call() {
        let floats = (u32::MAX as usize + 1) * 3;
        assert!(matches!(
            vertex_count_from_floats(floats),
            Err(MeshError::TooManyVertices { floats: f }) if f == floats
        ));
        assert_eq!(vertex_count_from_floats(u32::MAX as usize * 3).ok(), Some(u32::MAX));
    }

    #[test]
    fn rejects_bad_vertex_data() {
        let mut device = RecordingDevice::new();
        assert!(matches!(
            Mesh::new(&mut device, &[], None),
            Err(MeshError::Empty)
        ));
        assert!(matches!(
            Mesh::new(&mut device, &[1.0, 2.0, 3.0, 4.0], None),
            Err(MeshError::PartialVertex { len: 4 })
        ));
        assert!(matches!(
            Mesh::new(&mut device, &TRIANGLE, Some(&RED[..6])),
            Err(MeshError::MismatchedVertexCount {
                positions: 3,
                colors: 2
            })
        ));
        assert!(device.commands().is_empty());
    }

    #[test]
    fn failed_upload_releases_partial_allocations() {
        let mut device = RecordingDevice::new();
        device.limit_buffers(1);
        let err = Mesh::new(&mut device, &TRIANGLE, Some(&RED)).unwrap_err();
        assert!(matches!(err, MeshError::Device(DeviceError::Allocation(_))));
        assert!(device.is_clean());
    }

    #[test]
    fn draw_binds_draws_then_unbinds() {
        let mut device = RecordingDevice::new();
        let mesh = Mesh::new(&mut device, &TRIANGLE, None).unwrap();
        let vao = mesh.vertex_array();
        device.take_commands();

        mesh.draw(&mut device);
        assert_eq!(
            device.take_commands(),
            vec![
                Command::BindVertexArray(vao),
                Command::DrawTriangles { first: 0, count: 3 },
                Command::BindVertexArray(None),
            ]
        );
        mesh.destroy(&mut device);
    }

    #[test]
    fn destroy_releases_every_handle() {
        let mut device = RecordingDevice::new();
        let first = Mesh::new(&mut device, &TRIANGLE, Some(&RED)).unwrap();
        let second = Mesh::new(&mut device, &TRIANGLE, None).unwrap();
        assert_eq!(device.live_buffers(), 3);
        assert_eq!(device.live_vertex_arrays(), 2);

        first.destroy(&mut device);
        second.destroy(&mut device);
        assert!(device.is_clean());
        assert!(device.errors().is_empty());
    }
}
