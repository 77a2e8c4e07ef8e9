//! Frame orchestration.
//!
//! [`Renderer`] drives one frame end to end: wait out the frame slot's
//! fence, acquire a swapchain image, rebuild the slot maps and uniform
//! records from the scene snapshot, record the four passes back to back into
//! the slot's command buffer, submit with the image-available /
//! render-finished wiring, and present. Exactly one submission is
//! outstanding per frame slot; the fence wait is the only cross-frame
//! backpressure.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use dreams_core::RenderConfig;
use dreams_platform::{Surface, Window};
use dreams_resources::{CameraRecord, LightRecord, ObjectRecord};
use dreams_rhi::command::CommandPool;
use dreams_rhi::device::{Device, MemoryUsage};
use dreams_rhi::image::sample_count_flags;
use dreams_rhi::instance::Instance;
use dreams_rhi::physical_device::select_physical_device;
use dreams_rhi::swapchain::Swapchain;
use dreams_rhi::RhiError;
use dreams_scene::{EntityId, Scene};

use crate::assets::AssetLibrary;
use crate::error::{RenderError, RenderResult};
use crate::frame::{create_frames, FrameData, FrameGate};
use crate::passes::geometry::GeometryPlan;
use crate::passes::lighting::LightingPlan;
use crate::passes::pipelines::PassPipelines;
use crate::passes::shadow::ShadowPlan;
use crate::passes::{geometry, lighting, overlay, shadow};
use crate::pool::ResourcePool;
use crate::slots::FrameSlots;
use crate::text::{OverlayContext, TextRenderer};
use crate::{FRAME_TIMEOUT_NS, MAX_LIGHTS, MAX_OBJECTS};

/// The deferred renderer.
///
/// Field order is drop order: everything referencing the device precedes
/// it, and the surface outlives only the instance.
pub struct Renderer {
    text: TextRenderer,
    assets: AssetLibrary,
    frames: Vec<FrameData>,
    pool: ResourcePool,
    pipelines: PassPipelines,
    command_pool: CommandPool,
    swapchain: Swapchain,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,

    gate: FrameGate,
    current_frame: usize,
    camera: Option<EntityId>,
    config: RenderConfig,
    window_extent: (u32, u32),
    needs_rebuild: bool,
}

impl Renderer {
    /// Brings up the full GPU stack against `window`.
    ///
    /// `shader_dir` holds the compiled SPIR-V, `font_path` the overlay font.
    /// Any failure here is fatal initialization.
    ///
    /// # Errors
    ///
    /// Returns an error if device selection, swapchain, pipeline or pool
    /// creation fails.
    pub fn new(
        window: &Window,
        config: RenderConfig,
        shader_dir: &Path,
        font_path: &Path,
    ) -> RenderResult<Self> {
        config.validate()?;

        let instance = Instance::new(cfg!(debug_assertions))?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            window.width(),
            window.height(),
            config.present_mode,
        )?;
        let frame_count = swapchain.image_count();

        let command_pool = CommandPool::new(
            device.clone(),
            device.queue_families().graphics.unwrap_or(0),
        )?;

        let pipelines = PassPipelines::new(
            device.clone(),
            swapchain.format(),
            sample_count_flags(config.sample_count)?,
            shader_dir,
        )?;

        let pool = ResourcePool::new(
            device.clone(),
            &pipelines,
            &config,
            swapchain.extent(),
            frame_count,
        )?;

        let frames = create_frames(&device, &command_pool, frame_count)?;
        let gate = FrameGate::new(frame_count);

        let assets = AssetLibrary::new(device.clone(), pipelines.texture_set_layout())?;
        let text = TextRenderer::new(
            device.clone(),
            &command_pool,
            pipelines.overlay_set_layout(),
            frame_count,
            font_path,
            48.0,
        )?;

        info!(
            "Renderer initialized: {} frames in flight, {}x MSAA, {}^2 shadow maps",
            frame_count, config.sample_count, config.shadow_resolution
        );

        Ok(Self {
            text,
            assets,
            frames,
            pool,
            pipelines,
            command_pool,
            swapchain,
            device,
            surface,
            instance,
            gate,
            current_frame: 0,
            camera: None,
            config,
            window_extent: (window.width(), window.height()),
            needs_rebuild: false,
        })
    }

    /// Selects the camera entity used for the geometry pass.
    pub fn set_camera(&mut self, entity: EntityId) {
        self.camera = Some(entity);
    }

    /// The asset library, for loading models and reading bounds.
    pub fn assets(&self) -> &AssetLibrary {
        &self.assets
    }

    /// Uploads a model through the asset library.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    pub fn upload_model(
        &mut self,
        data: &dreams_resources::ModelData,
    ) -> RenderResult<dreams_scene::ModelRef> {
        self.assets.upload_model(data)
    }

    /// Uploads a texture through the asset library.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    pub fn upload_texture(
        &mut self,
        data: &dreams_resources::TextureData,
    ) -> RenderResult<dreams_scene::TextureRef> {
        self.assets.upload_texture(&self.command_pool, data)
    }

    /// GPU memory usage for the overlay readout.
    pub fn memory_usage(&self) -> MemoryUsage {
        self.device.memory_usage()
    }

    /// Notes a window resize; the swapchain and pool rebuild before the
    /// next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.window_extent = (width, height);
        self.needs_rebuild = true;
    }

    /// Renders one frame of `scene`, calling `overlay_draw` while the
    /// overlay pass is open.
    ///
    /// A frame that observes an out-of-date swapchain rebuilds and returns
    /// without drawing; the caller simply renders again.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::DeviceLost`] when a fence or acquire wait
    /// times out, and other errors for fatal GPU failures.
    pub fn render_frame<F>(&mut self, scene: &mut Scene, overlay_draw: F) -> RenderResult<()>
    where
        F: FnOnce(&mut OverlayContext),
    {
        if self.needs_rebuild {
            self.rebuild()?;
        }

        let frame = self.current_frame;

        // Sole cross-frame backpressure: the CPU may not touch this slot's
        // uniform memory while its previous submission is still in flight.
        if !self.gate.try_begin(frame) {
            match self.frames[frame].in_flight().wait(FRAME_TIMEOUT_NS) {
                Ok(()) => self.gate.mark_complete(frame),
                Err(RhiError::Vulkan(vk::Result::TIMEOUT)) => {
                    return Err(RenderError::DeviceLost(format!(
                        "frame {frame} fence wait expired"
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let image_index = match self.swapchain.acquire_next_image(
            self.frames[frame].image_available().handle(),
            FRAME_TIMEOUT_NS,
        ) {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    self.needs_rebuild = true;
                }
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during acquire");
                self.needs_rebuild = true;
                return Ok(());
            }
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
                return Err(RenderError::DeviceLost(
                    "swapchain acquire expired".to_string(),
                ));
            }
            Err(e) => return Err(RhiError::from(e).into()),
        };

        // Build this frame's slot maps and draw plans from the snapshot.
        let slots = FrameSlots::assign(scene, MAX_OBJECTS, MAX_LIGHTS);
        let shadow_plan = ShadowPlan::build(scene, &slots);
        let geometry_plan = GeometryPlan::build(scene, &slots, &self.assets);
        let lighting_plan = LightingPlan::build(scene, &slots);

        // The recomputed boxes flow back into the entities themselves; the
        // box always equals the transformed model bounds of this frame.
        for hitbox in &geometry_plan.hitboxes {
            scene.set_collision(hitbox.entity, hitbox.world_aabb);
        }

        let camera_record = self.camera_record(scene)?;
        self.write_uniforms(scene, frame, &slots, &shadow_plan, &geometry_plan, &camera_record)?;

        // Record all four passes into this frame's single command stream.
        let frame_data = &self.frames[frame];
        frame_data.in_flight().reset()?;
        let cmd = frame_data.command_buffer();
        cmd.reset()?;
        cmd.begin()?;

        shadow::record(cmd, &self.pool, &self.pipelines, &self.assets, frame, &shadow_plan)?;
        geometry::record(
            cmd,
            &self.pool,
            &self.pipelines,
            &self.assets,
            frame,
            &geometry_plan,
        )?;
        lighting::record(
            cmd,
            &self.pool,
            &self.pipelines,
            frame,
            &lighting_plan,
            self.swapchain.image(image_index as usize),
            self.swapchain.image_view(image_index as usize),
        )?;
        overlay::record(
            cmd,
            &self.pipelines,
            &mut self.text,
            frame,
            self.pool.extent(),
            self.swapchain.image(image_index as usize),
            self.swapchain.image_view(image_index as usize),
            overlay_draw,
        )?;

        cmd.end()?;

        self.submit(frame)?;
        self.gate.mark_submitted(frame);

        match self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.frames[frame].render_finished().handle(),
        ) {
            Ok(suboptimal) => {
                if suboptimal {
                    self.needs_rebuild = true;
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => {
                debug!("Swapchain out of date during present");
                self.needs_rebuild = true;
            }
            Err(e) => return Err(RhiError::from(e).into()),
        }

        self.current_frame = (self.current_frame + 1) % self.frames.len();
        Ok(())
    }

    /// Builds the orbit-camera record for this frame.
    fn camera_record(&self, scene: &Scene) -> RenderResult<CameraRecord> {
        let camera_entity = self.camera.ok_or(RenderError::NoCamera)?;
        let camera = scene.camera(camera_entity).ok_or(RenderError::NoCamera)?;
        let target_position = scene
            .position(camera.target)
            .unwrap_or_default()
            .to_vec3();

        let extent = self.pool.extent();
        let aspect = extent.width as f32 / extent.height as f32;

        Ok(CameraRecord::new(
            camera.projection_matrix(aspect),
            camera.view_matrix(target_position),
        ))
    }

    /// Writes every uniform record the passes will read this frame.
    fn write_uniforms(
        &self,
        scene: &Scene,
        frame: usize,
        slots: &FrameSlots,
        shadow_plan: &ShadowPlan,
        geometry_plan: &GeometryPlan,
        camera_record: &CameraRecord,
    ) -> RenderResult<()> {
        self.pool.write_camera(frame, camera_record)?;

        // Object transforms, then the recomputed boxes over them.
        let mut records: Vec<Option<ObjectRecord>> = vec![None; slots.object_count()];
        for view in scene.renderables() {
            if let Some(slot) = slots.object(view.entity) {
                records[slot] = Some(ObjectRecord::new(view.world_matrix()));
            }
        }
        for hitbox in &geometry_plan.hitboxes {
            if let Some(Some(record)) = records.get_mut(hitbox.slot) {
                record.aabb_min = hitbox.world_aabb.min.extend(0.0);
                record.aabb_max = hitbox.world_aabb.max.extend(0.0);
            }
        }
        for (slot, record) in records.iter().enumerate() {
            if let Some(record) = record {
                self.pool.write_object(frame, slot, record)?;
            }
        }

        // Shadow cameras, straight from the shadow plan.
        for light_pass in &shadow_plan.lights {
            self.pool
                .write_shadow_camera(frame, light_pass.slot, &light_pass.camera)?;
        }

        // Light shading records: world data plus the two matrices the
        // lighting shader needs to go depth -> world -> light clip space.
        let camera_inverse = camera_record.view_projection().inverse();
        for view in scene.lights() {
            let Some(slot) = slots.light(view.entity) else {
                continue;
            };
            let light_matrix = shadow_plan
                .lights
                .iter()
                .find(|pass| pass.slot == slot)
                .map(|pass| pass.camera.view_projection())
                .unwrap_or_default();

            let record = LightRecord {
                position: view.position.to_vec3().extend(1.0),
                direction: view.light.direction.extend(0.0),
                color: view.light.color.extend(1.0),
                light_matrix,
                camera_inverse,
            };
            self.pool.write_light(frame, slot, &record)?;
        }

        Ok(())
    }

    /// Submits the frame's command buffer with the standard wiring.
    fn submit(&self, frame: usize) -> RenderResult<()> {
        let frame_data = &self.frames[frame];
        let wait_semaphores = [frame_data.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame_data.render_finished().handle()];
        let command_buffers = [frame_data.command_buffer().handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .handle()
                .queue_submit(
                    self.device.graphics_queue(),
                    &[submit_info],
                    frame_data.in_flight().handle(),
                )
                .map_err(RhiError::from)?;
        }
        Ok(())
    }

    /// Recreates the swapchain and every resource sized to it.
    ///
    /// Used for resizes and for device-loss style recovery after an
    /// out-of-date or expired acquire.
    fn rebuild(&mut self) -> RenderResult<()> {
        let (width, height) = self.window_extent;
        warn!("Rebuilding swapchain and resource pool at {width}x{height}");

        self.device.wait_idle()?;
        self.swapchain
            .recreate(&self.instance, self.surface.handle(), width, height)?;

        let frame_count = self.swapchain.image_count();
        self.pool = ResourcePool::new(
            self.device.clone(),
            &self.pipelines,
            &self.config,
            self.swapchain.extent(),
            frame_count,
        )?;

        if self.frames.len() == frame_count {
            // Same slot count: fresh semaphores are enough, the fences were
            // waited idle above.
            for frame in &mut self.frames {
                frame.reset_semaphores(self.device.clone())?;
            }
        } else {
            self.frames = create_frames(&self.device, &self.command_pool, frame_count)?;
        }
        self.gate = FrameGate::new(frame_count);
        self.text.ensure_frames(self.device.clone(), frame_count)?;
        self.current_frame = 0;
        self.needs_rebuild = false;

        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Every in-flight frame must retire before resources are torn down.
        if let Err(e) = self.device.wait_idle() {
            warn!("wait_idle failed during renderer teardown: {e}");
        }
        info!("Renderer shut down");
    }
}
