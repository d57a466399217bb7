//! Stateful host hooks and scoped guards around them.
//!
//! Some hosts only evaluate the clip that is currently "active" on an armature and
//! record keys automatically while auto-keying is on. The baker never flips that
//! state directly; it acquires a guard that restores the previous value on drop,
//! error paths included.

/// Mutable selection state owned by the host application.
pub trait HostSession {
    fn active_clip(&self, armature: &str) -> Option<String>;
    fn set_active_clip(&mut self, armature: &str, clip: Option<&str>);
    fn auto_keying(&self) -> bool;
    fn set_auto_keying(&mut self, enabled: bool);
}

/// Host without selection state (pure samplers, tests).
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHost;

impl HostSession for NullHost {
    fn active_clip(&self, _armature: &str) -> Option<String> {
        None
    }

    fn set_active_clip(&mut self, _armature: &str, _clip: Option<&str>) {}

    fn auto_keying(&self) -> bool {
        false
    }

    fn set_auto_keying(&mut self, _enabled: bool) {}
}

/// Turns auto-keying off for its lifetime.
pub struct AutoKeyingGuard<'a, H: HostSession + ?Sized> {
    host: &'a mut H,
    previous: bool,
}

impl<'a, H: HostSession + ?Sized> AutoKeyingGuard<'a, H> {
    pub fn new(host: &'a mut H) -> Self {
        let previous = host.auto_keying();
        host.set_auto_keying(false);
        Self { host, previous }
    }

    pub fn host(&mut self) -> &mut H {
        self.host
    }
}

impl<H: HostSession + ?Sized> Drop for AutoKeyingGuard<'_, H> {
    fn drop(&mut self) {
        self.host.set_auto_keying(self.previous);
    }
}

/// Makes `clip` the active clip of every listed armature for its lifetime, so the
/// whole scene evaluates the same clip while frames are sampled.
pub struct ActiveClipGuard<'a, H: HostSession + ?Sized> {
    host: &'a mut H,
    previous: Vec<(String, Option<String>)>,
}

impl<'a, H: HostSession + ?Sized> ActiveClipGuard<'a, H> {
    pub fn new(host: &'a mut H, armatures: &[&str], clip: &str) -> Self {
        let mut previous = Vec::with_capacity(armatures.len());
        for &armature in armatures {
            previous.push((armature.to_string(), host.active_clip(armature)));
            host.set_active_clip(armature, Some(clip));
        }
        Self { host, previous }
    }
}

impl<H: HostSession + ?Sized> Drop for ActiveClipGuard<'_, H> {
    fn drop(&mut self) {
        for (armature, clip) in self.previous.iter().rev() {
            self.host.set_active_clip(armature, clip.as_deref());
        }
    }
}
