//! Dynamic rendering configuration (Vulkan 1.3).
//!
//! The geometry pass resolves its multisampled color and shade attachments
//! into single-sample images through resolve attachments declared here, which
//! replaces the subpass-feedback resolve a render-pass design would use.

use ash::vk;

/// Color attachment configuration.
#[derive(Clone)]
pub struct ColorAttachment {
    /// Image view rendered to.
    pub image_view: vk::ImageView,
    /// Layout during rendering.
    pub layout: vk::ImageLayout,
    /// Load operation at render start.
    pub load_op: vk::AttachmentLoadOp,
    /// Store operation at render end.
    pub store_op: vk::AttachmentStoreOp,
    /// Clear color when `load_op` is CLEAR.
    pub clear_value: vk::ClearColorValue,
    /// Resolve target for MSAA, null when unused.
    pub resolve_image_view: vk::ImageView,
    /// Layout of the resolve target.
    pub resolve_image_layout: vk::ImageLayout,
    /// MSAA resolve mode.
    pub resolve_mode: vk::ResolveModeFlags,
}

impl ColorAttachment {
    /// Clear-on-load, store-on-end attachment with a black clear color.
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 0.0],
            },
            resolve_image_view: vk::ImageView::null(),
            resolve_image_layout: vk::ImageLayout::UNDEFINED,
            resolve_mode: vk::ResolveModeFlags::NONE,
        }
    }

    /// Loads the existing contents instead of clearing. Used by the overlay
    /// pass to draw on top of the lighting output.
    pub fn load(mut self) -> Self {
        self.load_op = vk::AttachmentLoadOp::LOAD;
        self
    }

    /// Drops the attachment contents at render end. Used for multisampled
    /// attachments whose only consumer is their resolve target.
    pub fn dont_store(mut self) -> Self {
        self.store_op = vk::AttachmentStoreOp::DONT_CARE;
        self
    }

    /// Attaches a single-sample resolve target, averaging the samples.
    pub fn resolve_to(mut self, resolve_view: vk::ImageView) -> Self {
        self.resolve_image_view = resolve_view;
        self.resolve_image_layout = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
        self.resolve_mode = vk::ResolveModeFlags::AVERAGE;
        self
    }

    fn to_rendering_attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        let mut info = vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                color: self.clear_value,
            });

        if self.resolve_image_view != vk::ImageView::null() {
            info = info
                .resolve_image_view(self.resolve_image_view)
                .resolve_image_layout(self.resolve_image_layout)
                .resolve_mode(self.resolve_mode);
        }

        info
    }
}

/// Depth attachment configuration.
#[derive(Clone)]
pub struct DepthAttachment {
    /// Image view rendered to.
    pub image_view: vk::ImageView,
    /// Load operation at render start.
    pub load_op: vk::AttachmentLoadOp,
    /// Store operation at render end.
    pub store_op: vk::AttachmentStoreOp,
    /// Clear depth when `load_op` is CLEAR.
    pub clear_depth: f32,
}

impl DepthAttachment {
    /// Clear-to-far attachment that is discarded at render end.
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_depth: 1.0,
        }
    }

    /// Stores the depth contents at render end. Shadow maps need this; their
    /// depth is the pass output.
    pub fn store(mut self) -> Self {
        self.store_op = vk::AttachmentStoreOp::STORE;
        self
    }

    fn to_rendering_attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.clear_depth,
                    stencil: 0,
                },
            })
    }
}

/// Complete configuration for one dynamic rendering scope.
#[derive(Clone, Default)]
pub struct RenderingConfig {
    /// Color attachments.
    pub color_attachments: Vec<ColorAttachment>,
    /// Optional depth attachment.
    pub depth_attachment: Option<DepthAttachment>,
    /// Render area.
    pub render_area: vk::Rect2D,
}

impl RenderingConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            color_attachments: Vec::new(),
            depth_attachment: None,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width, height },
            },
        }
    }

    pub fn from_extent(extent: vk::Extent2D) -> Self {
        Self::new(extent.width, extent.height)
    }

    pub fn with_color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    pub fn with_depth_attachment(mut self, attachment: DepthAttachment) -> Self {
        self.depth_attachment = Some(attachment);
        self
    }

    /// Returns the render area extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.render_area.extent
    }

    /// Builds a bundle whose attachment arrays outlive the
    /// `vk::RenderingInfo` referencing them.
    pub fn build(&self) -> RenderingInfoBundle {
        RenderingInfoBundle {
            color_attachments: self
                .color_attachments
                .iter()
                .map(|a| a.to_rendering_attachment_info())
                .collect(),
            depth_attachment: self
                .depth_attachment
                .as_ref()
                .map(|a| a.to_rendering_attachment_info()),
            render_area: self.render_area,
        }
    }
}

/// Owned backing data for a `vk::RenderingInfo`.
pub struct RenderingInfoBundle {
    color_attachments: Vec<vk::RenderingAttachmentInfo<'static>>,
    depth_attachment: Option<vk::RenderingAttachmentInfo<'static>>,
    render_area: vk::Rect2D,
}

impl RenderingInfoBundle {
    /// The rendering info referencing this bundle's data; valid while the
    /// bundle lives.
    pub fn info(&self) -> vk::RenderingInfo<'_> {
        let mut info = vk::RenderingInfo::default()
            .render_area(self.render_area)
            .layer_count(1)
            .color_attachments(&self.color_attachments);

        if let Some(ref depth) = self.depth_attachment {
            info = info.depth_attachment(depth);
        }

        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_attachment_defaults() {
        let attachment = ColorAttachment::new(vk::ImageView::null());
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.resolve_mode, vk::ResolveModeFlags::NONE);
    }

    #[test]
    fn test_color_attachment_resolve() {
        let attachment = ColorAttachment::new(vk::ImageView::null())
            .dont_store()
            .resolve_to(vk::ImageView::null());
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(attachment.resolve_mode, vk::ResolveModeFlags::AVERAGE);
    }

    #[test]
    fn test_depth_attachment_store_for_shadows() {
        let attachment = DepthAttachment::new(vk::ImageView::null()).store();
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.clear_depth, 1.0);
    }

    #[test]
    fn test_rendering_config_collects_attachments() {
        let config = RenderingConfig::new(640, 480)
            .with_color_attachment(ColorAttachment::new(vk::ImageView::null()))
            .with_color_attachment(ColorAttachment::new(vk::ImageView::null()))
            .with_depth_attachment(DepthAttachment::new(vk::ImageView::null()));
        assert_eq!(config.color_attachments.len(), 2);
        assert!(config.depth_attachment.is_some());
        assert_eq!(config.extent().width, 640);

        let bundle = config.build();
        let info = bundle.info();
        assert_eq!(info.color_attachment_count, 2);
    }
}
