use postfx_core::EngineError;
use postfx_plan::{PoolLayout, SurfaceId};

use crate::device::{RenderDevice, SurfaceHandle, TextureHandle};

/// Owns every offscreen surface the pipeline renders into.
///
/// Allocated and finalized once; sizes and formats never change afterwards.
#[derive(Debug)]
pub struct ResourcePool {
    surfaces: Vec<(SurfaceId, SurfaceHandle)>,
}

impl ResourcePool {
    /// Allocate and finalize one surface per layout slot. On failure every surface created so
    /// far is released before the error is returned.
    pub fn allocate(
        device: &mut dyn RenderDevice,
        layout: &PoolLayout,
    ) -> Result<Self, EngineError> {
        let mut pool = Self {
            surfaces: Vec::with_capacity(SurfaceId::ALL.len()),
        };

        for (id, desc) in layout.iter() {
            let created = match device.allocate_surface(desc) {
                Ok(h) => {
                    pool.surfaces.push((*id, h));
                    device.finalize_surface(h)
                }
                Err(e) => Err(e),
            };
            if let Err(e) = created {
                tracing::error!(surface = id.name(), error = %e, "pool allocation failed");
                pool.destroy(device);
                return Err(e);
            }
            tracing::debug!(
                surface = id.name(),
                extent = %desc.extent,
                format = ?desc.color,
                "pool surface ready"
            );
        }

        tracing::info!(
            surfaces = pool.surfaces.len(),
            render = %layout.render(),
            display = %layout.display(),
            "resource pool allocated"
        );
        Ok(pool)
    }

    pub fn surface(&self, id: SurfaceId) -> Result<SurfaceHandle, EngineError> {
        self.surfaces
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, h)| *h)
            .ok_or_else(|| EngineError::UnknownSurface(id.name().to_string()))
    }

    pub fn color(
        &self,
        device: &dyn RenderDevice,
        id: SurfaceId,
    ) -> Result<TextureHandle, EngineError> {
        device.surface_color(self.surface(id)?)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Release every surface.
    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        for (_, h) in self.surfaces.drain(..) {
            device.destroy_surface(h);
        }
    }
}
