//! Per-frame command recording.

use meshview_resources::DrawRanges;
use meshview_rhi::command::GraphicsCommands;
use meshview_rhi::vk;

/// Handles the draw commands reference.
#[derive(Clone, Copy, Debug)]
pub struct DrawTargets {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub descriptor_set: vk::DescriptorSet,
}

/// Black color, depth 1.0.
pub fn clear_values() -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ]
}

/// Viewport covering `extent` with depth range 0..1.
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Record one frame of the mesh into `cmd`.
///
/// Each material range pushes its material index, binds the vertex buffer,
/// binds the index buffer at the range's first index and the slot's
/// descriptor set, then draws the range. Empty ranges record nothing, since
/// a trailing one would bind the index buffer at its own size.
pub fn record_draw_commands<C: GraphicsCommands>(
    cmd: &C,
    targets: &DrawTargets,
    ranges: &DrawRanges,
) {
    let clear = clear_values();
    cmd.begin_render_pass(
        targets.render_pass,
        targets.framebuffer,
        targets.extent,
        &clear,
    );
    cmd.bind_graphics_pipeline(targets.pipeline);
    cmd.set_viewport(full_viewport(targets.extent));
    cmd.set_scissor(vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: targets.extent,
    });

    for span in ranges.spans().filter(|span| span.index_count > 0) {
        cmd.push_constants(
            targets.pipeline_layout,
            vk::ShaderStageFlags::FRAGMENT,
            0,
            &span.material.to_ne_bytes(),
        );
        cmd.bind_vertex_buffer(targets.vertex_buffer, 0);
        cmd.bind_index_buffer(
            targets.index_buffer,
            span.first_index as vk::DeviceSize * size_of::<u32>() as vk::DeviceSize,
            vk::IndexType::UINT32,
        );
        cmd.bind_descriptor_set(targets.pipeline_layout, targets.descriptor_set);
        cmd.draw_indexed(span.index_count, 0, 0);
    }

    cmd.end_render_pass();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use meshview_resources::DrawRange;
    use meshview_rhi::vk::Handle;

    #[derive(Clone, Debug, PartialEq)]
    enum Cmd {
        BeginRenderPass(vk::Extent2D, usize),
        EndRenderPass,
        BindPipeline,
        Viewport(f32, f32),
        Scissor(vk::Extent2D),
        PushConstants(vk::ShaderStageFlags, u32, Vec<u8>),
        BindVertexBuffer(vk::DeviceSize),
        BindIndexBuffer(vk::DeviceSize, vk::IndexType),
        BindDescriptorSet(u64),
        DrawIndexed(u32, u32, i32),
    }

    #[derive(Default)]
    struct Recorder {
        cmds: RefCell<Vec<Cmd>>,
    }

    impl Recorder {
        fn push(&self, cmd: Cmd) {
            self.cmds.borrow_mut().push(cmd);
        }
    }

    impl GraphicsCommands for Recorder {
        fn begin_render_pass(
            &self,
            _render_pass: vk::RenderPass,
            _framebuffer: vk::Framebuffer,
            extent: vk::Extent2D,
            clear_values: &[vk::ClearValue],
        ) {
            self.push(Cmd::BeginRenderPass(extent, clear_values.len()));
        }

        fn end_render_pass(&self) {
            self.push(Cmd::EndRenderPass);
        }

        fn bind_graphics_pipeline(&self, _pipeline: vk::Pipeline) {
            self.push(Cmd::BindPipeline);
        }

        fn set_viewport(&self, viewport: vk::Viewport) {
            self.push(Cmd::Viewport(viewport.width, viewport.height));
        }

        fn set_scissor(&self, scissor: vk::Rect2D) {
            self.push(Cmd::Scissor(scissor.extent));
        }

        fn push_constants(
            &self,
            _layout: vk::PipelineLayout,
            stages: vk::ShaderStageFlags,
            offset: u32,
            data: &[u8],
        ) {
            self.push(Cmd::PushConstants(stages, offset, data.to_vec()));
        }

        fn bind_vertex_buffer(&self, _buffer: vk::Buffer, offset: vk::DeviceSize) {
            self.push(Cmd::BindVertexBuffer(offset));
        }

        fn bind_index_buffer(
            &self,
            _buffer: vk::Buffer,
            offset: vk::DeviceSize,
            index_type: vk::IndexType,
        ) {
            self.push(Cmd::BindIndexBuffer(offset, index_type));
        }

        fn bind_descriptor_set(&self, _layout: vk::PipelineLayout, set: vk::DescriptorSet) {
            self.push(Cmd::BindDescriptorSet(set.as_raw()));
        }

        fn draw_indexed(&self, index_count: u32, first_index: u32, vertex_offset: i32) {
            self.push(Cmd::DrawIndexed(index_count, first_index, vertex_offset));
        }
    }

    fn targets() -> DrawTargets {
        DrawTargets {
            render_pass: vk::RenderPass::null(),
            framebuffer: vk::Framebuffer::null(),
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            pipeline: vk::Pipeline::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            vertex_buffer: vk::Buffer::null(),
            index_buffer: vk::Buffer::null(),
            descriptor_set: vk::DescriptorSet::from_raw(7),
        }
    }

    #[test]
    fn test_two_ranges_record_two_draws() {
        let ranges =
            DrawRanges::new(vec![DrawRange::new(0, 300), DrawRange::new(1, 450)], 450).unwrap();
        let recorder = Recorder::default();

        record_draw_commands(&recorder, &targets(), &ranges);

        let cmds = recorder.cmds.into_inner();
        let draws: Vec<&Cmd> = cmds
            .iter()
            .filter(|c| matches!(c, Cmd::DrawIndexed(..)))
            .collect();
        assert_eq!(
            draws,
            vec![&Cmd::DrawIndexed(300, 0, 0), &Cmd::DrawIndexed(150, 0, 0)]
        );

        let index_offsets: Vec<vk::DeviceSize> = cmds
            .iter()
            .filter_map(|c| match c {
                Cmd::BindIndexBuffer(offset, ty) if *ty == vk::IndexType::UINT32 => Some(*offset),
                _ => None,
            })
            .collect();
        // 0 and 300 indices of 4 bytes each.
        assert_eq!(index_offsets, vec![0, 1200]);
    }

    #[test]
    fn test_full_command_sequence() {
        let ranges = DrawRanges::new(vec![DrawRange::new(3, 6)], 6).unwrap();
        let recorder = Recorder::default();

        record_draw_commands(&recorder, &targets(), &ranges);

        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        assert_eq!(
            recorder.cmds.into_inner(),
            vec![
                Cmd::BeginRenderPass(extent, 2),
                Cmd::BindPipeline,
                Cmd::Viewport(800.0, 600.0),
                Cmd::Scissor(extent),
                Cmd::PushConstants(vk::ShaderStageFlags::FRAGMENT, 0, 3u32.to_ne_bytes().to_vec()),
                Cmd::BindVertexBuffer(0),
                Cmd::BindIndexBuffer(0, vk::IndexType::UINT32),
                Cmd::BindDescriptorSet(7),
                Cmd::DrawIndexed(6, 0, 0),
                Cmd::EndRenderPass,
            ]
        );
    }

    #[test]
    fn test_empty_trailing_range_is_skipped() {
        let ranges =
            DrawRanges::new(vec![DrawRange::new(0, 6), DrawRange::new(1, 6)], 6).unwrap();
        let recorder = Recorder::default();

        record_draw_commands(&recorder, &targets(), &ranges);

        let cmds = recorder.cmds.into_inner();
        let binds: Vec<&Cmd> = cmds
            .iter()
            .filter(|c| matches!(c, Cmd::BindIndexBuffer(..)))
            .collect();
        let draws: Vec<&Cmd> = cmds
            .iter()
            .filter(|c| matches!(c, Cmd::DrawIndexed(..)))
            .collect();
        let pushes = cmds
            .iter()
            .filter(|c| matches!(c, Cmd::PushConstants(..)))
            .count();

        // 6 indices of 4 bytes: an offset of 24 would be past the last index.
        assert_eq!(binds, vec![&Cmd::BindIndexBuffer(0, vk::IndexType::UINT32)]);
        assert_eq!(draws, vec![&Cmd::DrawIndexed(6, 0, 0)]);
        assert_eq!(pushes, 1);
    }

    #[test]
    fn test_empty_leading_range_is_skipped() {
        let ranges =
            DrawRanges::new(vec![DrawRange::new(0, 0), DrawRange::new(1, 9)], 9).unwrap();
        let recorder = Recorder::default();

        record_draw_commands(&recorder, &targets(), &ranges);

        let cmds = recorder.cmds.into_inner();
        assert!(cmds.contains(&Cmd::PushConstants(
            vk::ShaderStageFlags::FRAGMENT,
            0,
            1u32.to_ne_bytes().to_vec()
        )));
        assert!(!cmds.contains(&Cmd::PushConstants(
            vk::ShaderStageFlags::FRAGMENT,
            0,
            0u32.to_ne_bytes().to_vec()
        )));
        assert_eq!(
            cmds.iter()
                .filter(|c| matches!(c, Cmd::DrawIndexed(..)))
                .count(),
            1
        );
    }

    #[test]
    fn test_clear_values() {
        let [color, depth] = clear_values();
        unsafe {
            assert_eq!(color.color.float32, [0.0, 0.0, 0.0, 1.0]);
            assert_eq!(depth.depth_stencil.depth, 1.0);
        }
    }

    #[test]
    fn test_full_viewport_depth_range() {
        let viewport = full_viewport(vk::Extent2D {
            width: 640,
            height: 480,
        });
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));
        assert_eq!((viewport.width, viewport.height), (640.0, 480.0));
    }
}
