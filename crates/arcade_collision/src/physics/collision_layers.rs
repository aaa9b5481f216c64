//! Collision layers for filtering which bodies may interact
//!
//! A body sits on one or more layers and carries a mask of the layers it
//! wants to interact with. A pair is tested only when each side's layer is in
//! the other side's mask.

use bitflags::bitflags;

bitflags! {
    /// Layer bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CollisionLayers: u32 {
        /// Player and AI ships
        const SHIP = 1 << 0;
        /// Lasers and other travelling projectiles
        const PROJECTILE = 1 << 1;
        /// Static placements (asteroids, stations, planets)
        const STATIC = 1 << 2;
        /// Volumes that report overlap but are never shot at
        const TRIGGER = 1 << 3;
        /// Bodies the mouse picker may select
        const PICKABLE = 1 << 4;
    }
}

/// Layer and mask of one body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionFilter {
    /// Layers this body is on
    pub layer: CollisionLayers,
    /// Layers this body interacts with
    pub mask: CollisionLayers,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layer: CollisionLayers::SHIP,
            mask: CollisionLayers::all(),
        }
    }
}

impl CollisionFilter {
    /// Create a filter
    pub const fn new(layer: CollisionLayers, mask: CollisionLayers) -> Self {
        Self { layer, mask }
    }

    /// Ships collide with everything and can be picked
    pub fn ship() -> Self {
        Self::new(CollisionLayers::SHIP | CollisionLayers::PICKABLE, CollisionLayers::all())
    }

    /// Static placements do not test against other statics
    pub fn static_placement() -> Self {
        Self::new(
            CollisionLayers::STATIC | CollisionLayers::PICKABLE,
            CollisionLayers::SHIP | CollisionLayers::PROJECTILE | CollisionLayers::TRIGGER,
        )
    }

    /// Trigger volumes overlap ships only
    pub fn trigger() -> Self {
        Self::new(CollisionLayers::TRIGGER, CollisionLayers::SHIP)
    }

    /// Mutual test: each side's layer must be in the other's mask
    pub fn should_collide(&self, other: &Self) -> bool {
        self.layer.intersects(other.mask) && other.layer.intersects(self.mask)
    }

    /// True if a projectile may hit a body with this filter
    pub fn accepts_projectiles(&self) -> bool {
        self.mask.contains(CollisionLayers::PROJECTILE) && !self.layer.contains(CollisionLayers::TRIGGER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_collide_mutual() {
        assert!(CollisionFilter::ship().should_collide(&CollisionFilter::static_placement()));
        assert!(CollisionFilter::ship().should_collide(&CollisionFilter::trigger()));
    }

    #[test]
    fn test_should_not_collide_one_way() {
        let statics = CollisionFilter::static_placement();
        assert!(!statics.should_collide(&statics));

        // The trigger only wants ships
        let drone = CollisionFilter::new(CollisionLayers::STATIC, CollisionLayers::all());
        assert!(!CollisionFilter::trigger().should_collide(&drone));
    }

    #[test]
    fn test_projectile_acceptance() {
        assert!(CollisionFilter::ship().accepts_projectiles());
        assert!(!CollisionFilter::trigger().accepts_projectiles());
        let ghost = CollisionFilter::new(CollisionLayers::SHIP, CollisionLayers::SHIP);
        assert!(!ghost.accepts_projectiles());
    }
}
