//! Main renderer orchestration.
//!
//! [`Renderer`] creates every Vulkan object the viewer needs and drives
//! [`FrameManager`] with a Vulkan-backed [`FrameBackend`].
//!
//! # Resource Destruction Order
//!
//! 1. Wait for the device to go idle
//! 2. Frame slots (command buffers, semaphores, fences)
//! 3. Model (descriptor pool, uniform buffers, textures, mesh buffers)
//! 4. Render target (framebuffers, views, depth buffer, swapchain)
//! 5. Pipeline, layouts and render pass
//! 6. Command pool, then the last device reference
//! 7. Surface
//! 8. Instance

use std::mem::ManuallyDrop;
use std::sync::Arc;

use tracing::{debug, error, info};
use winit::window::Window as WinitWindow;

use meshview_core::{EngineConfig, FrameClock, PresentModePreference};
use meshview_platform::{Surface, Window, drawable_extent};
use meshview_resources::ObjModel;
use meshview_rhi::command::CommandPool;
use meshview_rhi::descriptor::DescriptorSetLayout;
use meshview_rhi::device::Device;
use meshview_rhi::instance::{Instance, InstanceConfig};
use meshview_rhi::physical_device::select_physical_device;
use meshview_rhi::pipeline::{
    CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
    material_push_constant_range,
};
use meshview_rhi::render_pass::RenderPass;
use meshview_rhi::shader::{Shader, ShaderStage};
use meshview_rhi::swapchain::{AcquireOutcome, PresentOutcome};
use meshview_rhi::vertex::Vertex;
use meshview_rhi::{RhiError, vk};

use crate::depth_buffer::{DEPTH_FORMAT_CANDIDATES, select_depth_format};
use crate::draw::{DrawTargets, record_draw_commands};
use crate::error::RendererResult;
use crate::frame::FrameSlot;
use crate::frame_manager::{FrameBackend, FrameManager, FrameOutcome};
use crate::model::GpuModel;
use crate::render_target::{RecreateStatus, RenderTarget, TargetParams, usable_extent};
use crate::ubo::{CameraParams, UniformBufferObject, aspect_ratio};
use crate::{MAX_FRAMES_IN_FLIGHT, MAX_TEXTURES};

/// Vulkan present mode for a configured preference.
pub(crate) fn present_mode_for(preference: PresentModePreference) -> vk::PresentModeKHR {
    match preference {
        PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
        PresentModePreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
    }
}

/// Device-level state the frame loop operates on.
///
/// Fields drop in declaration order, which is the required destruction
/// order. The surface and instance outlive this struct.
struct VulkanBackend {
    slots: Vec<FrameSlot>,
    model: GpuModel,
    target: Option<RenderTarget>,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    _set_layout: DescriptorSetLayout,
    render_pass: RenderPass,
    _command_pool: CommandPool,
    device: Arc<Device>,

    window: Arc<WinitWindow>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    present_mode: vk::PresentModeKHR,
    depth_format: vk::Format,
    camera: CameraParams,
    clock: FrameClock,
}

impl VulkanBackend {
    fn target_params(&self) -> TargetParams<'_> {
        TargetParams {
            device: &self.device,
            surface_loader: &self.surface_loader,
            surface: self.surface,
            preferred_present_mode: self.present_mode,
            depth_format: self.depth_format,
        }
    }

    fn target(&self) -> RendererResult<&RenderTarget> {
        self.target
            .as_ref()
            .ok_or_else(|| RhiError::Precondition("no render target".into()).into())
    }

    fn slot(&self, slot: usize) -> RendererResult<&FrameSlot> {
        self.slots.get(slot).ok_or_else(|| {
            RhiError::Precondition(format!(
                "frame slot {} out of range ({} slots)",
                slot,
                self.slots.len()
            ))
            .into()
        })
    }
}

impl FrameBackend for VulkanBackend {
    fn wait_for_slot(&mut self, slot: usize) -> RendererResult<()> {
        Ok(self.slot(slot)?.wait()?)
    }

    fn acquire(&mut self, slot: usize) -> RendererResult<AcquireOutcome> {
        let semaphore = self.slot(slot)?.sync().image_available_semaphore().handle();
        Ok(self.target()?.swapchain().acquire_next_image(semaphore)?)
    }

    fn update_uniforms(&mut self, slot: usize) -> RendererResult<()> {
        let aspect = aspect_ratio(self.target()?.extent());
        let ubo = UniformBufferObject::compute(&self.camera, self.clock.elapsed_secs(), aspect);
        Ok(self.model.update_uniforms(slot, &ubo)?)
    }

    fn begin_slot(&mut self, slot: usize) -> RendererResult<()> {
        Ok(self.slot(slot)?.begin()?)
    }

    fn record(&mut self, slot: usize, image_index: u32) -> RendererResult<()> {
        let target = self.target()?;
        let framebuffer = target.framebuffer(image_index)?;
        let targets = DrawTargets {
            render_pass: self.render_pass.handle(),
            framebuffer: framebuffer.handle(),
            extent: framebuffer.extent(),
            pipeline: self.pipeline.handle(),
            pipeline_layout: self.pipeline_layout.handle(),
            vertex_buffer: self.model.vertex_buffer(),
            index_buffer: self.model.index_buffer(),
            descriptor_set: self.model.descriptor_set(slot)?,
        };

        let cmd = self.slot(slot)?.command_buffer();
        record_draw_commands(cmd, &targets, self.model.draw_ranges());
        Ok(cmd.end()?)
    }

    fn submit(&mut self, slot: usize) -> RendererResult<()> {
        Ok(self.slot(slot)?.submit(&self.device)?)
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome> {
        let semaphore = self.slot(slot)?.sync().render_finished_semaphore().handle();
        Ok(self.target()?.swapchain().present(
            self.device.present_queue(),
            image_index,
            semaphore,
        )?)
    }

    fn recreate(&mut self) -> RendererResult<RecreateStatus> {
        let window_extent = drawable_extent(&self.window);
        let mut target = self.target.take();
        let result = RenderTarget::recreate(
            &mut target,
            &self.target_params(),
            window_extent,
            self.render_pass.handle(),
        );
        self.target = target;
        Ok(result?)
    }
}

/// Owns the Vulkan instance, surface and everything drawn into it.
///
/// ManuallyDrop is used to ensure correct destruction order.
pub struct Renderer {
    frames: FrameManager,
    backend: ManuallyDrop<VulkanBackend>,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<Instance>,
}

impl Renderer {
    /// Create a renderer for `window` and upload the configured model.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the model cannot be
    /// loaded, or any Vulkan resource creation fails.
    pub fn new(window: &Window, config: &EngineConfig) -> RendererResult<Self> {
        config.validate()?;

        let window_extent = usable_extent(window.drawable_extent()).ok_or_else(|| {
            RhiError::Precondition("window has zero extent at startup".into())
        })?;
        info!(
            "Initializing Vulkan renderer ({}x{})",
            window_extent.width, window_extent.height
        );

        let instance = Instance::new(
            &InstanceConfig {
                application_name: config.title.clone(),
                enable_validation: config.enable_validation,
                ..Default::default()
            },
            Some(window.raw_display_handle()?),
        )?;

        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let depth_format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| {
            device.format_properties(format)
        })?;
        debug!("Depth format: {:?}", depth_format);

        let present_mode = present_mode_for(config.present_mode);
        let params = TargetParams {
            device: &device,
            surface_loader: surface.loader(),
            surface: surface.handle(),
            preferred_present_mode: present_mode,
            depth_format,
        };
        let mut target = RenderTarget::create(&params, window_extent)?;

        let render_pass = RenderPass::new(device.clone(), target.color_format(), depth_format)?;
        target.create_framebuffers(render_pass.handle())?;

        let set_layout = DescriptorSetLayout::for_mesh(device.clone(), MAX_TEXTURES)?;
        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[set_layout.handle()],
            &[material_push_constant_range()],
        )?;
        let pipeline = Self::create_pipeline(&device, config, &pipeline_layout, &render_pass)?;

        let command_pool = CommandPool::new(device.clone(), device.queue_families().graphics)?;
        let slots = FrameSlot::create_all(&device, &command_pool, MAX_FRAMES_IN_FLIGHT)?;

        info!("Loading model: {}", config.model_path.display());
        let model = ObjModel::load(&config.model_path)?;
        let model = GpuModel::upload(&device, &command_pool, &set_layout, &model)?;

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight, {} draw range(s)",
            target.image_count(),
            MAX_FRAMES_IN_FLIGHT,
            model.draw_ranges().len()
        );

        let backend = VulkanBackend {
            slots,
            model,
            target: Some(target),
            pipeline,
            pipeline_layout,
            _set_layout: set_layout,
            render_pass,
            _command_pool: command_pool,
            device,
            window: window.inner_arc(),
            surface_loader: surface.loader().clone(),
            surface: surface.handle(),
            present_mode,
            depth_format,
            camera: CameraParams::from(config),
            clock: FrameClock::new(),
        };

        Ok(Self {
            frames: FrameManager::new(),
            backend: ManuallyDrop::new(backend),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
        })
    }

    /// Mesh pipeline: depth tested, no culling, material index pushed to the
    /// fragment stage.
    fn create_pipeline(
        device: &Arc<Device>,
        config: &EngineConfig,
        layout: &PipelineLayout,
        render_pass: &RenderPass,
    ) -> RendererResult<Pipeline> {
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &config.vertex_shader_path(),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &config.fragment_shader_path(),
            ShaderStage::Fragment,
            "main",
        )?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .cull_mode(CullMode::None)
            .front_face(FrontFace::CounterClockwise)
            .depth_test_enable(true)
            .depth_write_enable(true)
            .render_pass(render_pass.handle(), 0)
            .build(device.clone(), layout)?;

        info!("Mesh pipeline created");
        Ok(pipeline)
    }

    /// Draw one frame.
    ///
    /// # Errors
    ///
    /// Any Vulkan failure other than an out-of-date or suboptimal swapchain.
    pub fn render_frame(&mut self) -> RendererResult<FrameOutcome> {
        self.frames.draw_frame(&mut *self.backend)
    }

    /// Notes that the window was resized.
    ///
    /// The swapchain is rebuilt after the next present.
    pub fn resize(&mut self) {
        debug!("Resize requested");
        self.frames.notify_resized();
    }

    /// The surface had zero extent at the last recreation attempt.
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.frames.is_suspended()
    }

    /// Frames completed since startup, including deferred ones.
    #[inline]
    pub fn frame_counter(&self) -> u64 {
        self.frames.frame_counter()
    }

    /// Current swapchain extent, if a render target exists.
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.backend.target.as_ref().map(RenderTarget::extent)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.backend.device.wait_idle() {
            error!(
                "Failed to wait for device idle during renderer drop: {:?}",
                e
            );
        }

        // SAFETY: each field is dropped exactly once, here, and never used
        // afterwards. The backend owns the last device reference and the
        // swapchain, so it goes before the surface and the instance.
        unsafe {
            ManuallyDrop::drop(&mut self.backend);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_mode_for() {
        assert_eq!(
            present_mode_for(PresentModePreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            present_mode_for(PresentModePreference::Fifo),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            present_mode_for(PresentModePreference::Immediate),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn test_default_config_prefers_mailbox() {
        let config = EngineConfig::default();
        assert_eq!(
            present_mode_for(config.present_mode),
            vk::PresentModeKHR::MAILBOX
        );
    }
}
