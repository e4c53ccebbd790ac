use crate::camera::Camera;
use crate::device::Device;
use crate::mesh::Mesh;
use crate::shader::{ShaderError, ShaderPipeline};
use glam::Mat4;

/// Name of the combined model-view-projection uniform every pipeline used
/// with [`Renderer`] must declare.
pub const MVP_UNIFORM: &str = "model_view_projection";

/// Composes camera transforms with a model matrix and issues one draw.
///
/// The renderer owns nothing: it borrows the camera and the pipeline for as
/// long as it lives, so both necessarily outlive it. It never mutates either.
pub struct Renderer<'a> {
    camera: &'a dyn Camera,
    pipeline: &'a ShaderPipeline,
}

impl<'a> Renderer<'a> {
    pub fn new(camera: &'a dyn Camera, pipeline: &'a ShaderPipeline) -> Self {
        Self { camera, pipeline }
    }

    /// `projection * view * model`, the transform uploaded by [`Renderer::render`].
    pub fn model_view_projection(&self, model: &Mat4) -> Mat4 {
        self.camera.projection_matrix() * self.camera.view_matrix() * *model
    }

    /// Draw `mesh` placed by `model`. Each call is its own draw; calling it
    /// twice in a frame draws the mesh twice.
    pub fn render<D: Device + ?Sized>(
        &self,
        device: &mut D,
        mesh: &Mesh,
        model: &Mat4,
    ) -> Result<(), ShaderError> {
        let combined = self.model_view_projection(model);
        let mut active = self.pipeline.use_program(device)?;
        active.set_uniform_mat4(MVP_UNIFORM, &combined);
        active.draw(mesh);
        Ok(())
    }
}
