//! Scoped frame state
//!
//! Both guards enable their state on entry and disable it again when
//! dropped, so every exit path out of the draw section leaves the context
//! as it was found. They deref to the wrapped context, and nest:
//! attributes are entered through the capability guard and therefore
//! released first.

use crate::gl::{AttributeLocation, Capability, CullFace, FrontFace, GraphicsContext};
use std::ops::{Deref, DerefMut};

/// Depth test plus back-face culling with counter-clockwise front faces
pub struct CapabilityScope<'a, G: GraphicsContext + ?Sized> {
    ctx: &'a mut G,
}

impl<'a, G: GraphicsContext + ?Sized> CapabilityScope<'a, G> {
    pub fn enter(ctx: &'a mut G) -> Self {
        ctx.enable(Capability::DepthTest);
        ctx.enable(Capability::CullFace);
        ctx.cull_face(CullFace::Back);
        ctx.front_face(FrontFace::CounterClockwise);
        Self { ctx }
    }
}

impl<G: GraphicsContext + ?Sized> Drop for CapabilityScope<'_, G> {
    fn drop(&mut self) {
        self.ctx.disable(Capability::CullFace);
        self.ctx.disable(Capability::DepthTest);
    }
}

impl<G: GraphicsContext + ?Sized> Deref for CapabilityScope<'_, G> {
    type Target = G;

    fn deref(&self) -> &G {
        self.ctx
    }
}

impl<G: GraphicsContext + ?Sized> DerefMut for CapabilityScope<'_, G> {
    fn deref_mut(&mut self) -> &mut G {
        self.ctx
    }
}

/// A fixed set of enabled vertex attributes
pub struct AttributeScope<'a, G: GraphicsContext + ?Sized, const N: usize> {
    ctx: &'a mut G,
    attributes: [AttributeLocation; N],
}

impl<'a, G: GraphicsContext + ?Sized, const N: usize> AttributeScope<'a, G, N> {
    pub fn enter(ctx: &'a mut G, attributes: [AttributeLocation; N]) -> Self {
        for &location in &attributes {
            ctx.enable_vertex_attrib(location);
        }
        Self { ctx, attributes }
    }
}

impl<G: GraphicsContext + ?Sized, const N: usize> Drop for AttributeScope<'_, G, N> {
    fn drop(&mut self) {
        for &location in &self.attributes {
            self.ctx.disable_vertex_attrib(location);
        }
    }
}

impl<G: GraphicsContext + ?Sized, const N: usize> Deref for AttributeScope<'_, G, N> {
    type Target = G;

    fn deref(&self) -> &G {
        self.ctx
    }
}

impl<G: GraphicsContext + ?Sized, const N: usize> DerefMut for AttributeScope<'_, G, N> {
    fn deref_mut(&mut self) -> &mut G {
        self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{GlCall, RecordingContext};

    #[test]
    fn test_nested_scopes_restore_state() {
        let mut ctx = RecordingContext::new();
        let attributes = [AttributeLocation(0), AttributeLocation(3)];
        {
            let mut capabilities = CapabilityScope::enter(&mut ctx);
            let scoped = AttributeScope::enter(&mut *capabilities, attributes);
            assert!(scoped.is_enabled(Capability::DepthTest));
            assert_eq!(scoped.enabled_attributes(), attributes.to_vec());
        }

        assert!(!ctx.is_enabled(Capability::DepthTest));
        assert!(!ctx.is_enabled(Capability::CullFace));
        assert!(ctx.enabled_attributes().is_empty());

        assert_eq!(
            ctx.calls(),
            &[
                GlCall::Enable(Capability::DepthTest),
                GlCall::Enable(Capability::CullFace),
                GlCall::CullFace(CullFace::Back),
                GlCall::FrontFace(FrontFace::CounterClockwise),
                GlCall::EnableVertexAttrib(AttributeLocation(0)),
                GlCall::EnableVertexAttrib(AttributeLocation(3)),
                GlCall::DisableVertexAttrib(AttributeLocation(0)),
                GlCall::DisableVertexAttrib(AttributeLocation(3)),
                GlCall::Disable(Capability::CullFace),
                GlCall::Disable(Capability::DepthTest),
            ]
        );
    }

    #[test]
    fn test_early_exit_still_releases() {
        fn bail(ctx: &mut RecordingContext) -> Result<(), ()> {
            let mut capabilities = CapabilityScope::enter(ctx);
            let _attributes = AttributeScope::enter(&mut *capabilities, [AttributeLocation(1)]);
            Err(())
        }

        let mut ctx = RecordingContext::new();
        assert!(bail(&mut ctx).is_err());
        assert!(!ctx.is_enabled(Capability::CullFace));
        assert!(ctx.enabled_attributes().is_empty());
    }
}
