use crate::channel::command::Feature;

/// What the user asked for and what the device last accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToggleState {
    pub intended: bool,
    pub confirmed: bool,
}

impl ToggleState {
    pub fn is_pending(&self) -> bool {
        self.intended != self.confirmed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureToggles {
    ras: ToggleState,
    haptic: ToggleState,
    laser: ToggleState,
}

impl FeatureToggles {
    pub fn new() -> Self {
        FeatureToggles::default()
    }

    pub fn get(&self, feature: Feature) -> ToggleState {
        match feature {
            Feature::Ras => self.ras,
            Feature::Haptic => self.haptic,
            Feature::Laser => self.laser,
        }
    }

    fn get_mut(&mut self, feature: Feature) -> &mut ToggleState {
        match feature {
            Feature::Ras => &mut self.ras,
            Feature::Haptic => &mut self.haptic,
            Feature::Laser => &mut self.laser,
        }
    }

    /// The switch flips right away, before the command reaches the device.
    pub fn request(&mut self, feature: Feature, enabled: bool) {
        self.get_mut(feature).intended = enabled;
    }

    pub fn confirm(&mut self, feature: Feature, enabled: bool) {
        let state = self.get_mut(feature);
        state.confirmed = enabled;
        state.intended = enabled;
    }

    /// Returns the state the switch went back to.
    pub fn revert(&mut self, feature: Feature) -> bool {
        let state = self.get_mut(feature);
        state.intended = state.confirmed;
        state.intended
    }
}
