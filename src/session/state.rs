use crate::camera::LensFacing;

/// Whether a camera is currently bound, and for which lens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingState {
    #[default]
    Unbound,
    Bound(LensFacing),
}

impl BindingState {
    pub fn is_bound(&self) -> bool {
        matches!(self, BindingState::Bound(_))
    }
}

/// State owned by the camera session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub lens: LensFacing,
    pub torch_enabled: bool,
    pub binding: BindingState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorchIcon {
    On,
    Off,
}

/// What the camera chrome shows over the preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlsView {
    pub lens: LensFacing,
    /// The torch control only exists for the back lens
    pub torch_visible: bool,
    pub torch_icon: TorchIcon,
    pub shutter_enabled: bool,
    pub gallery_enabled: bool,
    pub captured_count: usize,
}

impl ControlsView {
    pub(crate) fn from_state(state: &SessionState, captured_count: usize) -> Self {
        Self {
            lens: state.lens,
            torch_visible: state.lens == LensFacing::Back,
            torch_icon: if state.torch_enabled {
                TorchIcon::On
            } else {
                TorchIcon::Off
            },
            shutter_enabled: state.binding.is_bound(),
            gallery_enabled: false,
            captured_count,
        }
    }
}
