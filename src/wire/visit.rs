//! Mutable traversal over every version-sensitive field of a packet.
//!
//! Converters implement [`VisitMut`] for the fields a step touches and let
//! [`Walk`] find them, so no converter needs its own per-command match.

use crate::wire::ident::{
    Acs, Cap, CapId, CellId, DriveId, Identifier, Lsm, LsmId, MessageId, PanelId, PoolId, PortId,
    SubpanelId, UserId, VolId, VolRange,
};
use crate::wire::status::Status;
use crate::wire::types::{CapMode, CapPriority, DriveType, MediaType};

pub trait VisitMut {
    fn visit_acs(&mut self, _acs: &mut Acs) {}

    fn visit_lsm(&mut self, _lsm: &mut Lsm) {}

    fn visit_cap(&mut self, _cap: &mut Cap) {}

    fn visit_pool(&mut self, _pool: &mut PoolId) {}

    fn visit_priority(&mut self, _priority: &mut CapPriority) {}

    /// `owner` is the LSM the status is reported against, when known.
    fn visit_status(&mut self, _status: &mut Status, _owner: Option<LsmId>) {}

    fn visit_media_type(&mut self, _media_type: &mut Option<MediaType>) {}

    fn visit_drive_type(&mut self, _drive_type: &mut Option<DriveType>) {}

    fn visit_cap_extras(
        &mut self,
        _priority: &mut Option<CapPriority>,
        _mode: &mut Option<CapMode>,
    ) {
    }
}

pub trait Walk {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V);

    /// The LSM a status paired with this value is reported against.
    fn status_owner(&self) -> Option<LsmId> {
        None
    }
}

impl<T: Walk> Walk for Vec<T> {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        for item in self.iter_mut() {
            item.walk(visitor);
        }
    }
}

/// Bare `i8` identifiers in lists are ACS numbers.
impl Walk for Acs {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        visitor.visit_acs(self);
    }
}

impl Walk for MessageId {
    fn walk<V: VisitMut + ?Sized>(&mut self, _visitor: &mut V) {}
}

impl Walk for LsmId {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        visitor.visit_acs(&mut self.acs);
        visitor.visit_lsm(&mut self.lsm);
    }

    fn status_owner(&self) -> Option<LsmId> {
        Some(*self)
    }
}

impl Walk for CapId {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        self.lsm_id.walk(visitor);
        visitor.visit_cap(&mut self.cap);
    }

    fn status_owner(&self) -> Option<LsmId> {
        Some(self.lsm_id)
    }
}

impl Walk for PanelId {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        self.lsm_id.walk(visitor);
    }

    fn status_owner(&self) -> Option<LsmId> {
        Some(self.lsm_id)
    }
}

impl Walk for SubpanelId {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        self.panel_id.walk(visitor);
    }

    fn status_owner(&self) -> Option<LsmId> {
        Some(self.panel_id.lsm_id)
    }
}

impl Walk for DriveId {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        self.panel_id.walk(visitor);
    }

    fn status_owner(&self) -> Option<LsmId> {
        Some(self.panel_id.lsm_id)
    }
}

impl Walk for CellId {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        self.panel_id.walk(visitor);
    }

    fn status_owner(&self) -> Option<LsmId> {
        Some(self.panel_id.lsm_id)
    }
}

impl Walk for PortId {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        visitor.visit_acs(&mut self.acs);
    }
}

impl Walk for PoolId {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        visitor.visit_pool(self);
    }
}

impl Walk for VolId {
    fn walk<V: VisitMut + ?Sized>(&mut self, _visitor: &mut V) {}
}

impl Walk for VolRange {
    fn walk<V: VisitMut + ?Sized>(&mut self, _visitor: &mut V) {}
}

impl Walk for UserId {
    fn walk<V: VisitMut + ?Sized>(&mut self, _visitor: &mut V) {}
}

impl Walk for Identifier {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        match self {
            Self::None | Self::Volume(_) | Self::Request(_) => {}
            Self::Acs(acs) => visitor.visit_acs(acs),
            Self::Lsm(id) => id.walk(visitor),
            Self::Cap(id) => id.walk(visitor),
            Self::Drive(id) => id.walk(visitor),
            Self::Port(id) => id.walk(visitor),
            Self::Pool(id) => id.walk(visitor),
            Self::Panel(id) => id.walk(visitor),
            Self::Subpanel(id) => id.walk(visitor),
        }
    }

    fn status_owner(&self) -> Option<LsmId> {
        self.lsm_id()
    }
}
