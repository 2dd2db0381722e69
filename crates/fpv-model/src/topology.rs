//! Radio topology engine
//!
//! Owns the radio interfaces and radio links of a model and the assignment
//! of interfaces to links. Links are kept in a dense, order-stable list so
//! that an interface's [`LinkId`] is always a position in that list; removing
//! a link compacts the list and shifts every reference after it.
//!
//! Mutating operations leave capability flags to be re-derived: call
//! [`RadioTopology::back_propagate_capabilities`] (or the model's validation
//! pass) after any of them.

use fpv_protocol::radio::{
    default_frequency_for_bands, default_sub_ghz_frequency, format_frequency,
    is_frequency_in_bands, DEFAULTS_24, DEFAULTS_58, MAX_RADIO_INTERFACES,
};
use fpv_protocol::{Band, CapabilityFlags, CardModel, HardwareRadio, RadioDriver};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::interface::{LinkId, RadioInterface};
use crate::link::{
    DataRate, DataRateType, RadioLink, DEFAULT_LOWEST_DATA_RATE, DEFAULT_SERIAL_AIR_RATE,
    DEFAULT_SIK_AIR_RATE,
};

/// Interfaces, links and the assignment between them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadioTopology {
    interfaces: Vec<RadioInterface>,
    links: Vec<RadioLink>,
    #[serde(skip)]
    last_swapped: Option<(usize, usize)>,
}

impl PartialEq for RadioTopology {
    fn eq(&self, other: &Self) -> bool {
        self.interfaces == other.interfaces && self.links == other.links
    }
}

impl Eq for RadioTopology {}

impl RadioTopology {
    /// Empty topology
    pub fn new() -> Self {
        Self::default()
    }

    /// Topology over a set of interfaces, with no links yet
    pub fn from_interfaces(interfaces: Vec<RadioInterface>) -> Self {
        Self::from_parts(interfaces, Vec::new())
    }

    /// Topology from existing interfaces and links
    ///
    /// Both lists are bounded to [`MAX_RADIO_INTERFACES`]. The assignment is
    /// taken as-is; run [`reconcile`](Self::reconcile) to repair it.
    pub fn from_parts(mut interfaces: Vec<RadioInterface>, mut links: Vec<RadioLink>) -> Self {
        interfaces.truncate(MAX_RADIO_INTERFACES);
        links.truncate(MAX_RADIO_INTERFACES);
        Self {
            interfaces,
            links,
            last_swapped: None,
        }
    }

    pub fn interfaces(&self) -> &[RadioInterface] {
        &self.interfaces
    }

    pub fn links(&self) -> &[RadioLink] {
        &self.links
    }

    pub fn interface(&self, index: usize) -> Option<&RadioInterface> {
        self.interfaces.get(index)
    }

    pub fn link(&self, index: usize) -> Option<&RadioLink> {
        self.links.get(index)
    }

    pub(crate) fn interfaces_mut(&mut self) -> &mut [RadioInterface] {
        &mut self.interfaces
    }

    pub(crate) fn links_mut(&mut self) -> &mut [RadioLink] {
        &mut self.links
    }

    /// Interfaces assigned to a link, with their indexes
    pub fn interfaces_on_link(
        &self,
        link: usize,
    ) -> impl Iterator<Item = (usize, &RadioInterface)> + '_ {
        self.interfaces
            .iter()
            .enumerate()
            .filter(move |(_, iface)| iface.link_id == LinkId::new(link))
    }

    /// Interfaces that swapped places in the last successful swap
    pub fn last_swapped(&self) -> Option<(usize, usize)> {
        self.last_swapped
    }

    // ------------------------------------------------------------------
    // Population and reconciliation
    // ------------------------------------------------------------------

    /// Throw away all links and build one per usable interface
    ///
    /// Disabled and unsupported interfaces are skipped. Links that end up on
    /// the same frequency are merged afterwards.
    pub fn populate_defaults(&mut self) {
        info!(
            "Populating default radio links for {} radio interface(s)",
            self.interfaces.len()
        );
        self.links.clear();
        for iface in &mut self.interfaces {
            iface.link_id = LinkId::UNASSIGNED;
        }

        for index in 0..self.interfaces.len() {
            let iface = &self.interfaces[index];
            if iface.is_disabled() || !iface.is_supported() {
                debug!(
                    "Radio interface {} is disabled or unsupported, no link for it",
                    index + 1
                );
                continue;
            }
            self.add_link_for_interface(index);
        }

        self.collapse_duplicate_frequencies();
        self.back_propagate_capabilities();
    }

    /// Repair the assignment after the hardware or the links changed
    ///
    /// Removes links no assigned interface can tune to, merges links sharing
    /// a frequency, creates links for usable unassigned interfaces and
    /// re-derives capability flags. Returns whether anything changed.
    pub fn reconcile(&mut self) -> bool {
        let dangling = self.drop_dangling_assignments();
        let removed = self.remove_invalid_links();
        let mut collapsed = self.collapse_duplicate_frequencies();
        let adopted = self.adopt_orphan_interfaces();
        if adopted {
            // new links may land on a frequency already in use
            collapsed |= self.collapse_duplicate_frequencies();
        }
        self.back_propagate_capabilities();
        if removed || collapsed || adopted {
            info!(
                "Radio links reconciled: {} link(s) for {} interface(s)",
                self.links.len(),
                self.interfaces.len()
            );
        }
        dangling || removed || collapsed || adopted
    }

    /// Unassign interfaces pointing past the end of the link list
    pub(crate) fn drop_dangling_assignments(&mut self) -> bool {
        let count = self.links.len();
        let mut changed = false;
        for (index, iface) in self.interfaces.iter_mut().enumerate() {
            if let Some(link) = iface.link_id.index() {
                if link >= count {
                    warn!(
                        "Radio interface {} points at missing radio link {}, unassigned",
                        index + 1,
                        link + 1
                    );
                    iface.link_id = LinkId::UNASSIGNED;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Remove links with no interface, or with an interface that cannot tune
    /// to the link frequency (ELRS modules are not band checked)
    pub fn remove_invalid_links(&mut self) -> bool {
        let mut changed = false;
        let mut index = 0;
        while index < self.links.len() {
            let frequency = self.links[index].frequency_khz;
            let (has_interface, bands_ok) = {
                let mut assigned = self.interfaces_on_link(index).peekable();
                let has_interface = assigned.peek().is_some();
                let bands_ok = assigned.all(|(_, iface)| {
                    iface.capabilities.contains(CapabilityFlags::ELRS)
                        || is_frequency_in_bands(frequency, iface.supported_bands)
                });
                (has_interface, bands_ok)
            };

            if has_interface && bands_ok {
                index += 1;
                continue;
            }
            info!(
                "Removing radio link {} ({}): no valid radio interface assigned to it",
                index + 1,
                format_frequency(frequency)
            );
            self.remove_link(index);
            changed = true;
        }
        changed
    }

    /// Merge links sharing a frequency into the first of them
    pub fn collapse_duplicate_frequencies(&mut self) -> bool {
        let mut changed = false;
        let mut first = 0;
        while first < self.links.len() {
            let mut other = first + 1;
            while other < self.links.len() {
                if self.links[other].frequency_khz != self.links[first].frequency_khz {
                    other += 1;
                    continue;
                }
                info!(
                    "Radio links {} and {} share {}, merging into link {}",
                    first + 1,
                    other + 1,
                    format_frequency(self.links[first].frequency_khz),
                    first + 1
                );
                for iface in &mut self.interfaces {
                    if iface.link_id == LinkId::new(other) {
                        iface.link_id = LinkId::new(first);
                    }
                }
                self.remove_link(other);
                changed = true;
            }
            first += 1;
        }
        changed
    }

    /// Create links for enabled, data capable interfaces without one
    pub fn adopt_orphan_interfaces(&mut self) -> bool {
        let mut changed = false;
        for index in 0..self.interfaces.len() {
            let iface = &self.interfaces[index];
            if iface.link_id.is_assigned() {
                continue;
            }
            if iface.is_disabled() {
                debug!("Radio interface {} is disabled, left unassigned", index + 1);
                continue;
            }
            if !iface.capabilities.contains(CapabilityFlags::DATA) {
                debug!("Radio interface {} cannot carry data, left unassigned", index + 1);
                continue;
            }
            info!("Radio interface {} has no radio link, creating one", index + 1);
            if self.add_link_for_interface(index).is_some() {
                changed = true;
            }
        }
        changed
    }

    /// Append a new link for an interface and assign the interface to it
    ///
    /// WiFi cards get the first unused default of their preferred band, SiK
    /// radios the default of their highest sub-GHz band and other serial
    /// radios keep the frequency the hardware reports. Returns the new link
    /// index, or `None` if the interface does not exist or the link list is
    /// full.
    pub fn add_link_for_interface(&mut self, index: usize) -> Option<usize> {
        let iface = self.interfaces.get(index)?;
        if self.links.len() >= MAX_RADIO_INTERFACES {
            warn!(
                "Can't add a radio link for interface {}: {} links already",
                index + 1,
                self.links.len()
            );
            return None;
        }

        let bands = iface.supported_bands;
        let mut link = RadioLink::default();
        let mut iface_caps = iface.capabilities;

        if iface.is_sik() {
            iface_caps.remove(CapabilityFlags::HIGH_CAPACITY | CapabilityFlags::VIDEO);
            iface_caps |= CapabilityFlags::SERIAL_LINK | CapabilityFlags::SIK;
            link.capabilities
                .remove(CapabilityFlags::HIGH_CAPACITY | CapabilityFlags::VIDEO);
            link.capabilities |= CapabilityFlags::SERIAL_LINK | CapabilityFlags::SIK;
            link.set_all_rates(DEFAULT_SIK_AIR_RATE);
            link.frequency_khz =
                default_sub_ghz_frequency(bands).unwrap_or_else(|| default_frequency_for_bands(bands));
        } else if iface.is_serial() {
            let elrs = iface.card_model.detected() == CardModel::SERIAL_RADIO_ELRS
                || iface.capabilities.contains(CapabilityFlags::ELRS);
            iface_caps.remove(CapabilityFlags::HIGH_CAPACITY | CapabilityFlags::VIDEO);
            iface_caps |= CapabilityFlags::SERIAL_LINK;
            link.capabilities
                .remove(CapabilityFlags::HIGH_CAPACITY | CapabilityFlags::VIDEO);
            link.capabilities |= CapabilityFlags::SERIAL_LINK;
            if elrs {
                iface_caps |= CapabilityFlags::ELRS;
                link.capabilities |= CapabilityFlags::ELRS;
            }
            link.set_all_rates(DEFAULT_SERIAL_AIR_RATE);
            link.frequency_khz = match iface.current_frequency_khz {
                0 => default_frequency_for_bands(bands),
                f => f,
            };
        } else {
            iface_caps |= CapabilityFlags::HIGH_CAPACITY;
            iface_caps.remove(CapabilityFlags::SERIAL_LINK);
            link.capabilities |= CapabilityFlags::HIGH_CAPACITY | CapabilityFlags::VIDEO;
            link.capabilities.remove(CapabilityFlags::SERIAL_LINK);
            link.frequency_khz = self.next_default_wifi_frequency(bands);
        }

        let link_index = self.links.len();
        info!(
            "Added radio link {} on {} for radio interface {}",
            link_index + 1,
            format_frequency(link.frequency_khz),
            index + 1
        );
        let iface = &mut self.interfaces[index];
        iface.capabilities = iface_caps;
        iface.link_id = LinkId::new(link_index);
        iface.current_frequency_khz = link.frequency_khz;
        iface.frame_flags = link.frame_flags;
        self.links.push(link);
        Some(link_index)
    }

    /// First of the primary/secondary defaults not taken by a link, else
    /// the tertiary default
    fn next_default_wifi_frequency(&self, bands: Band) -> u32 {
        let defaults = if bands.contains(Band::B58) {
            DEFAULTS_58
        } else {
            DEFAULTS_24
        };
        defaults[..2]
            .iter()
            .copied()
            .find(|f| !self.links.iter().any(|l| l.frequency_khz == *f))
            .unwrap_or(defaults[2])
    }

    /// Remove a link, compacting the list
    ///
    /// Interfaces on the removed link become unassigned; references to later
    /// links shift down by one.
    pub fn remove_link(&mut self, index: usize) -> Option<RadioLink> {
        if index >= self.links.len() {
            return None;
        }
        let removed = self.links.remove(index);
        for iface in &mut self.interfaces {
            match iface.link_id.index() {
                Some(link) if link == index => iface.link_id = LinkId::UNASSIGNED,
                Some(link) if link > index => iface.link_id = LinkId::new(link - 1),
                _ => {}
            }
        }
        Some(removed)
    }

    /// Derive link capability flags from the interfaces assigned to them
    ///
    /// A link is high capacity (and video capable) iff one of its interfaces
    /// is high capacity. Interfaces mirror their link's frame flags.
    pub fn back_propagate_capabilities(&mut self) {
        for (index, link) in self.links.iter_mut().enumerate() {
            let high_capacity = self
                .interfaces
                .iter()
                .any(|iface| iface.link_id == LinkId::new(index) && iface.is_high_capacity());
            let video = CapabilityFlags::HIGH_CAPACITY | CapabilityFlags::VIDEO;
            if high_capacity {
                link.capabilities |= video;
            } else {
                link.capabilities.remove(video);
            }
        }

        for iface in &mut self.interfaces {
            if !iface.is_high_capacity() {
                iface.capabilities.remove(CapabilityFlags::VIDEO);
            }
            if let Some(link) = iface.link_id.index().and_then(|l| self.links.get(l)) {
                iface.frame_flags = link.frame_flags;
            }
        }
    }

    /// Set the relay flag on the elected link and its interfaces only
    ///
    /// No flag is set when `relay_link` is out of range or only one link
    /// exists. Returns whether any flag changed.
    pub fn apply_relay_flags(&mut self, relay_link: Option<usize>) -> bool {
        let elected = relay_link.filter(|l| *l < self.links.len() && self.links.len() > 1);
        let mut changed = false;

        for (index, link) in self.links.iter_mut().enumerate() {
            let relay = elected == Some(index);
            if link.is_relay() != relay {
                debug!("Radio link {} relay flag -> {}", index + 1, relay);
                link.capabilities.set(CapabilityFlags::RELAY, relay);
                changed = true;
            }
        }
        for (index, iface) in self.interfaces.iter_mut().enumerate() {
            let relay = elected.is_some() && iface.link_id.index() == elected;
            if iface.capabilities.contains(CapabilityFlags::RELAY) != relay {
                debug!("Radio interface {} relay flag -> {}", index + 1, relay);
                iface.capabilities.set(CapabilityFlags::RELAY, relay);
                changed = true;
            }
        }
        changed
    }

    // ------------------------------------------------------------------
    // Swap and rotate
    // ------------------------------------------------------------------

    /// True if two high capacity interfaces can trade links
    ///
    /// Pass the detected hardware on a vehicle: both cards must then be
    /// present, high capacity, and able to tune to the other's frequency.
    pub fn can_swap_high_capacity(&self, hardware: Option<&[HardwareRadio]>) -> bool {
        let result = self.swap_candidates(hardware);
        debug!("Can swap high capacity radio interfaces: {}", result.is_some());
        result.is_some()
    }

    /// Exchange the links of the two swappable high capacity interfaces
    ///
    /// Link definitions stay where they are; the interfaces trade link
    /// assignment, relay flag and current frequency. Nothing changes if the
    /// swap is not possible.
    pub fn swap_high_capacity(&mut self, hardware: Option<&[HardwareRadio]>) -> bool {
        let Some((a, b)) = self.swap_candidates(hardware) else {
            warn!("Can't swap radio interfaces: no matching pair");
            return false;
        };

        let (link_a, link_b) = (self.interfaces[a].link_id, self.interfaces[b].link_id);
        let relay_a = self.interfaces[a].capabilities.contains(CapabilityFlags::RELAY);
        let relay_b = self.interfaces[b].capabilities.contains(CapabilityFlags::RELAY);
        let freq_a = self.interfaces[a].current_frequency_khz;
        let freq_b = self.interfaces[b].current_frequency_khz;

        let first = &mut self.interfaces[a];
        first.link_id = link_b;
        first.capabilities.set(CapabilityFlags::RELAY, relay_b);
        first.current_frequency_khz = freq_b;

        let second = &mut self.interfaces[b];
        second.link_id = link_a;
        second.capabilities.set(CapabilityFlags::RELAY, relay_a);
        second.current_frequency_khz = freq_a;

        self.last_swapped = Some((a, b));
        info!(
            "Swapped radio interface {} (now on link {}) and {} (now on link {})",
            a + 1,
            link_b,
            b + 1,
            link_a
        );
        true
    }

    fn swap_candidates(&self, hardware: Option<&[HardwareRadio]>) -> Option<(usize, usize)> {
        if self.interfaces.len() < 2 || self.links.len() < 2 {
            return None;
        }
        let on_high_capacity_link = |iface: &RadioInterface| {
            iface.is_high_capacity()
                && iface
                    .link_id
                    .index()
                    .and_then(|l| self.links.get(l))
                    .is_some_and(|l| l.is_high_capacity())
        };

        let mut candidates: Vec<usize> = Vec::new();
        for i in 0..self.interfaces.len() {
            for k in (i + 1)..self.interfaces.len() {
                let (a, b) = (&self.interfaces[i], &self.interfaces[k]);
                if a.supported_bands == b.supported_bands
                    && a.link_id != b.link_id
                    && on_high_capacity_link(a)
                    && on_high_capacity_link(b)
                {
                    for index in [i, k] {
                        if !candidates.contains(&index) {
                            candidates.push(index);
                        }
                    }
                }
            }
        }
        let [a, b] = candidates[..] else {
            return None;
        };

        if let Some(hardware) = hardware {
            let (hw_a, hw_b) = (hardware.get(a)?, hardware.get(b)?);
            if !hw_a.high_capacity || !hw_b.high_capacity {
                return None;
            }
            let freq_a = self.links[self.interfaces[a].link_id.index()?].frequency_khz;
            let freq_b = self.links[self.interfaces[b].link_id.index()?].frequency_khz;
            if !hw_a.supports_frequency(freq_b) {
                warn!(
                    "Radio interface {} can't tune to {}",
                    a + 1,
                    format_frequency(freq_b)
                );
                return None;
            }
            if !hw_b.supports_frequency(freq_a) {
                warn!(
                    "Radio interface {} can't tune to {}",
                    b + 1,
                    format_frequency(freq_a)
                );
                return None;
            }
        }
        Some((a, b))
    }

    /// Shift every link one slot forward, interfaces following their link
    ///
    /// Returns false with fewer than two links.
    pub fn rotate_links(&mut self) -> bool {
        let count = self.links.len();
        if count < 2 {
            debug!("Nothing to rotate, {} radio link(s)", count);
            return false;
        }
        for iface in &mut self.interfaces {
            if let Some(link) = iface.link_id.index() {
                iface.link_id = LinkId::new((link + 1) % count);
            }
        }
        self.links.rotate_right(1);
        info!("Rotated {} radio links", count);
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// First interface assigned to a link
    pub fn interface_for_link(&self, link: usize) -> Option<usize> {
        if link >= self.links.len() {
            return None;
        }
        self.interfaces_on_link(link).map(|(i, _)| i).next()
    }

    /// Link's first interface, used to classify the link
    fn link_owner(&self, link: usize) -> Option<&RadioInterface> {
        self.interface_for_link(link).map(|i| &self.interfaces[i])
    }

    pub fn link_is_wifi(&self, link: usize) -> bool {
        self.link_owner(link).is_some_and(|i| i.is_wifi())
    }

    pub fn link_is_sik(&self, link: usize) -> bool {
        self.link_owner(link).is_some_and(|i| i.is_sik())
    }

    pub fn link_is_elrs(&self, link: usize) -> bool {
        self.link_owner(link).is_some_and(|i| i.is_elrs())
    }

    /// Effective downlink data rate of a link
    ///
    /// Atheros cards always send data at the video rate.
    pub fn downlink_data_rate(&self, link: usize) -> DataRate {
        let Some(l) = self.links.get(link) else {
            return DataRate::AUTO;
        };
        if self
            .interfaces_on_link(link)
            .any(|(_, iface)| iface.driver() == RadioDriver::Atheros)
        {
            return l.video_rate;
        }
        match l.downlink_rate_type {
            DataRateType::Fixed => l.data_rate,
            DataRateType::SameAsVideo => l.video_rate,
            DataRateType::Lowest | DataRateType::Auto => lowest_rate_for(l.video_rate),
        }
    }

    /// Effective uplink data rate of a link
    pub fn uplink_data_rate(&self, link: usize) -> DataRate {
        let Some(l) = self.links.get(link) else {
            return DataRate::AUTO;
        };
        match l.uplink_rate_type {
            DataRateType::Fixed => l.uplink_data_rate,
            DataRateType::SameAsVideo => l.video_rate,
            DataRateType::Lowest | DataRateType::Auto => lowest_rate_for(l.video_rate),
        }
    }
}

/// Lowest rate in the same encoding family as the video rate
fn lowest_rate_for(video: DataRate) -> DataRate {
    if video.0 > 0 {
        DEFAULT_LOWEST_DATA_RATE
    } else {
        DataRate::mcs(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::interfaces_from_hardware;
    use fpv_protocol::radio::{DEFAULT_FREQUENCY_24, DEFAULT_FREQUENCY_58, DEFAULT_FREQUENCY_58_2};

    fn wifi(bands: Band) -> HardwareRadio {
        HardwareRadio::wifi(
            "wlan",
            "00:00:00:00:00:01",
            RadioDriver::Rtl88xxau,
            CardModel::ALFA_AWUS036ACH,
            bands,
        )
    }

    fn topology(radios: &[HardwareRadio]) -> RadioTopology {
        RadioTopology::from_interfaces(interfaces_from_hardware(radios))
    }

    #[test]
    fn test_populate_picks_distinct_defaults() {
        let mut topo = topology(&[wifi(Band::B58 | Band::B24), wifi(Band::B58 | Band::B24)]);
        topo.populate_defaults();
        assert_eq!(topo.links().len(), 2);
        assert_eq!(topo.links()[0].frequency_khz, DEFAULT_FREQUENCY_58);
        assert_eq!(topo.links()[1].frequency_khz, DEFAULT_FREQUENCY_58_2);
        assert!(topo.links().iter().all(|l| l.is_high_capacity()));
    }

    #[test]
    fn test_populate_skips_disabled() {
        let mut unsupported = wifi(Band::B24);
        unsupported.supported = false;
        let mut topo = topology(&[unsupported, wifi(Band::B24)]);
        topo.populate_defaults();
        assert_eq!(topo.links().len(), 1);
        assert_eq!(topo.interfaces()[0].link_id, LinkId::UNASSIGNED);
        assert_eq!(topo.interfaces()[1].link_id, LinkId::new(0));
        assert_eq!(topo.links()[0].frequency_khz, DEFAULT_FREQUENCY_24);
    }

    #[test]
    fn test_populate_merges_same_serial_frequency() {
        let elrs = |port: &str| {
            HardwareRadio::serial(port, CardModel::SERIAL_RADIO_ELRS, Band::B915, 915_000)
        };
        let mut topo = topology(&[elrs("/dev/ttyACM0"), elrs("/dev/ttyACM1")]);
        topo.populate_defaults();
        assert_eq!(topo.links().len(), 1);
        assert_eq!(topo.interfaces()[0].link_id, LinkId::new(0));
        assert_eq!(topo.interfaces()[1].link_id, LinkId::new(0));
    }

    #[test]
    fn test_remove_invalid_links() {
        let mut topo = topology(&[wifi(Band::B24), wifi(Band::B24), wifi(Band::B24)]);
        topo.populate_defaults();
        topo.interfaces_mut()[1].supported_bands = Band::B58;
        topo.interfaces_mut()[2].link_id = LinkId::UNASSIGNED;
        let kept = topo.links()[0].frequency_khz;

        assert!(topo.remove_invalid_links());
        assert_eq!(topo.links().len(), 1);
        assert_eq!(topo.links()[0].frequency_khz, kept);
        assert_eq!(topo.interfaces()[0].link_id, LinkId::new(0));
        assert_eq!(topo.interfaces()[1].link_id, LinkId::UNASSIGNED);
        assert!(!topo.remove_invalid_links());
    }

    #[test]
    fn test_remove_link_compacts() {
        let mut topo = topology(&[wifi(Band::B24), wifi(Band::B24), wifi(Band::B24)]);
        topo.populate_defaults();
        assert_eq!(topo.links().len(), 3);

        topo.remove_link(1);
        assert_eq!(topo.links().len(), 2);
        assert_eq!(topo.interfaces()[0].link_id, LinkId::new(0));
        assert_eq!(topo.interfaces()[1].link_id, LinkId::UNASSIGNED);
        assert_eq!(topo.interfaces()[2].link_id, LinkId::new(1));
        assert!(topo.remove_link(5).is_none());
    }

    #[test]
    fn test_reconcile_drops_out_of_band_link() {
        let mut topo = topology(&[wifi(Band::B24)]);
        topo.populate_defaults();
        topo.links_mut()[0].frequency_khz = 5_805_000;

        assert!(topo.reconcile());
        assert_eq!(topo.links().len(), 1);
        assert_eq!(topo.links()[0].frequency_khz, DEFAULT_FREQUENCY_24);
        assert_eq!(topo.interfaces()[0].link_id, LinkId::new(0));
    }

    #[test]
    fn test_reconcile_rechecks_after_removal() {
        let mut topo = topology(&[wifi(Band::B24), wifi(Band::B24)]);
        topo.populate_defaults();
        topo.links_mut()[0].frequency_khz = 5_805_000;
        topo.links_mut()[1].frequency_khz = 5_745_000;

        topo.reconcile();
        assert_eq!(topo.links().len(), 2);
        assert!(topo
            .links()
            .iter()
            .all(|l| is_frequency_in_bands(l.frequency_khz, Band::B24)));
    }

    #[test]
    fn test_reconcile_is_stable() {
        let mut topo = topology(&[wifi(Band::B58), HardwareRadio::sik("/dev/ttyUSB0", Band::B433)]);
        topo.populate_defaults();
        assert!(!topo.reconcile());
    }

    #[test]
    fn test_elrs_link_is_not_band_checked() {
        let elrs = HardwareRadio::serial("/dev/ttyACM0", CardModel::SERIAL_RADIO_ELRS, Band::B915, 2_440_000);
        let mut topo = topology(&[elrs]);
        topo.populate_defaults();
        assert_eq!(topo.links()[0].frequency_khz, 2_440_000);
        assert!(!topo.reconcile());
        assert!(topo.link_is_elrs(0));
    }

    #[test]
    fn test_rotate() {
        let mut topo = topology(&[wifi(Band::B24), wifi(Band::B24), wifi(Band::B24)]);
        topo.populate_defaults();
        let before: Vec<u32> = topo.links().iter().map(|l| l.frequency_khz).collect();

        assert!(topo.rotate_links());
        let after: Vec<u32> = topo.links().iter().map(|l| l.frequency_khz).collect();
        assert_eq!(after, vec![before[2], before[0], before[1]]);
        for (i, iface) in topo.interfaces().iter().enumerate() {
            let link = iface.link_id.index().unwrap();
            assert_eq!(link, (i + 1) % 3);
            assert_eq!(topo.links()[link].frequency_khz, before[i]);
        }
    }

    #[test]
    fn test_rotate_needs_two_links() {
        let mut topo = topology(&[wifi(Band::B24)]);
        topo.populate_defaults();
        let before = topo.clone();
        assert!(!topo.rotate_links());
        assert_eq!(topo, before);
    }

    #[test]
    fn test_swap_pair() {
        let mut topo = topology(&[wifi(Band::B58), wifi(Band::B58)]);
        topo.populate_defaults();
        assert!(topo.can_swap_high_capacity(None));
        assert!(topo.swap_high_capacity(None));
        assert_eq!(topo.interfaces()[0].link_id, LinkId::new(1));
        assert_eq!(topo.interfaces()[1].link_id, LinkId::new(0));
        assert_eq!(topo.interfaces()[0].current_frequency_khz, DEFAULT_FREQUENCY_58_2);
        assert_eq!(topo.interfaces()[1].current_frequency_khz, DEFAULT_FREQUENCY_58);
        assert_eq!(topo.last_swapped(), Some((0, 1)));
    }

    #[test]
    fn test_swap_needs_matching_bands() {
        let mut topo = topology(&[wifi(Band::B58), wifi(Band::B24)]);
        topo.populate_defaults();
        let before = topo.clone();
        assert!(!topo.can_swap_high_capacity(None));
        assert!(!topo.swap_high_capacity(None));
        assert_eq!(topo, before);
        assert_eq!(topo.last_swapped(), None);
    }

    #[test]
    fn test_swap_checks_hardware() {
        let radios = [wifi(Band::B58), wifi(Band::B58)];
        let mut topo = topology(&radios);
        topo.populate_defaults();

        let mut low = radios.clone();
        low[1].high_capacity = false;
        assert!(!topo.can_swap_high_capacity(Some(&low[..])));
        assert!(!topo.can_swap_high_capacity(Some(&radios[..1])));
        assert!(topo.can_swap_high_capacity(Some(&radios[..])));
    }

    #[test]
    fn test_data_rates() {
        let mut topo = topology(&[wifi(Band::B58)]);
        topo.populate_defaults();
        assert_eq!(topo.downlink_data_rate(0), DEFAULT_LOWEST_DATA_RATE);

        topo.links_mut()[0].downlink_rate_type = DataRateType::Fixed;
        assert_eq!(topo.downlink_data_rate(0), topo.links()[0].data_rate);

        topo.links_mut()[0].uplink_rate_type = DataRateType::SameAsVideo;
        assert_eq!(topo.uplink_data_rate(0), topo.links()[0].video_rate);

        topo.links_mut()[0].video_rate = DataRate::mcs(3);
        topo.links_mut()[0].uplink_rate_type = DataRateType::Lowest;
        assert_eq!(topo.uplink_data_rate(0), DataRate::mcs(0));
        assert_eq!(topo.downlink_data_rate(7), DataRate::AUTO);
    }

    #[test]
    fn test_atheros_uses_video_rate() {
        let card = HardwareRadio::wifi("wlan0", "aa", RadioDriver::Atheros, CardModel::ATHEROS_GENERIC, Band::B24);
        let mut topo = topology(&[card]);
        topo.populate_defaults();
        topo.links_mut()[0].downlink_rate_type = DataRateType::Fixed;
        assert_eq!(topo.downlink_data_rate(0), topo.links()[0].video_rate);
    }

    #[test]
    fn test_relay_flags() {
        let mut topo = topology(&[wifi(Band::B58), wifi(Band::B58)]);
        topo.populate_defaults();

        assert!(topo.apply_relay_flags(Some(1)));
        assert!(!topo.links()[0].is_relay());
        assert!(topo.links()[1].is_relay());
        assert!(topo.interfaces()[1].capabilities.contains(CapabilityFlags::RELAY));
        assert!(!topo.apply_relay_flags(Some(1)));

        assert!(topo.apply_relay_flags(None));
        assert!(topo.links().iter().all(|l| !l.is_relay()));
    }

    #[test]
    fn test_single_link_never_relays() {
        let mut topo = topology(&[wifi(Band::B58)]);
        topo.populate_defaults();
        topo.apply_relay_flags(Some(0));
        assert!(!topo.links()[0].is_relay());
        assert!(!topo.interfaces()[0].capabilities.contains(CapabilityFlags::RELAY));
    }
}
