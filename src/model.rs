//! Binding decoded card sets to the isotopes they describe.
//!
//! Card sets are flat lists, but resonances, radii and particle pairs belong to
//! particular isotopes. Resonances follow their spin group, both kinds of radius
//! follow the spin groups they list, and particle pairs follow the masses of
//! their particles. [`ParameterModel::apply`] sorts each card into that structure and
//! [`ParameterModel::card_sets`] flattens it again.
use crate::card_set::{CardFamily, CardSet};
use crate::cards::{
    BroadeningRecord, ChannelAssignment, CompactExternalRRecord, DataReductionRecord, ExternalRRecord,
    FixedRadiusRecord, IsotopeRecord, NormalizationRecord, OrresRecord, ParamagneticRecord,
    ParticlePairRecord, RadiusRecord, ResonanceRecord, UnusedVariable, UserResolutionRecord,
};
use crate::parfile::ParameterFile;

/// Masses within this many amu are taken to be the same isotope.
pub const MASS_TOLERANCE: f64 = 0.01;

/// Name given to the isotope created when a card needs one and none exists.
pub const UNKNOWN_ISOTOPE: &str = "UNK-000";

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Isotope {
    pub name: String,
    pub abundance: Option<IsotopeRecord>,
    pub resonances: Vec<ResonanceRecord>,
    pub radii: Vec<RadiusRecord>,
    pub fixed_radii: Vec<FixedRadiusRecord>,
    pub particle_pairs: Vec<ParticlePairRecord>,
}

impl Isotope {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// The spin groups listed on this isotope's abundance record.
    pub fn spin_groups(&self) -> &[i64] {
        self.abundance.as_ref().map(|a| a.spin_groups.as_slice()).unwrap_or_default()
    }

    pub fn mass(&self) -> Option<f64> {
        self.abundance.as_ref().map(|a| a.mass)
    }

    fn matches_mass(&self, mass: f64) -> bool {
        self.mass().map(|m| (m - mass).abs() < MASS_TOLERANCE).unwrap_or(false)
    }
}

/// Parameters that belong to the measurement rather than to an isotope.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhysicsParameters {
    pub external_r: Vec<ExternalRRecord>,
    pub compact_external_r: Vec<CompactExternalRRecord>,
    pub broadening: Option<BroadeningRecord>,
    pub unused: Vec<UnusedVariable>,
    pub normalization: Vec<NormalizationRecord>,
    pub data_reduction: Vec<DataReductionRecord>,
    pub orres: Option<OrresRecord>,
    pub paramagnetic: Vec<ParamagneticRecord>,
    pub user_resolution: Option<UserResolutionRecord>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterModel {
    pub fudge: Option<f64>,
    pub isotopes: Vec<Isotope>,
    pub physics: PhysicsParameters,
    /// Isotope index of each resonance in the order the resonance card listed them.
    resonance_order: Vec<usize>,
}

impl ParameterModel {
    /// Build a model from a parameter file. The isotope abundance card is applied
    /// first so that the other cards can be matched to its isotopes.
    pub fn from_file(file: &ParameterFile) -> Self {
        let mut model = Self { fudge: file.fudge, ..Default::default() };
        let mut cards: Vec<&CardSet> = file.cards.iter().collect();
        cards.sort_by_key(|c| c.family() != CardFamily::IsotopeAbundance);
        for card in cards {
            model.apply(card.clone());
        }
        model
    }

    pub fn to_file(&self) -> ParameterFile {
        ParameterFile { fudge: self.fudge, cards: self.card_sets() }
    }

    /// The first isotope, created if the model has none.
    fn default_isotope(&mut self) -> &mut Isotope {
        if self.isotopes.is_empty() {
            tracing::debug!(name = UNKNOWN_ISOTOPE, "no isotopes defined, creating a placeholder");
            self.isotopes.push(Isotope::new(UNKNOWN_ISOTOPE));
        }
        &mut self.isotopes[0]
    }

    /// Merge one card into the model.
    ///
    /// Isotope abundance records update the isotope of the same mass, fill a
    /// placeholder isotope, or add a new isotope. Every other card replaces what
    /// the model held for its family.
    pub fn apply(&mut self, card: CardSet) {
        match card {
            CardSet::IsotopeAbundance(records) => records.into_iter().for_each(|r| self.apply_abundance(r)),
            CardSet::Resonance(records) => self.apply_resonances(records),
            CardSet::Radii(records) => self.apply_radii(records),
            CardSet::FixedRadii(records) => self.apply_fixed_radii(records),
            CardSet::ParticlePair(records) => self.apply_particle_pairs(records),
            CardSet::ExternalR(records) => self.physics.external_r = records,
            CardSet::CompactExternalR(records) => self.physics.compact_external_r = records,
            CardSet::Broadening(records) => self.physics.broadening = records.into_iter().next(),
            CardSet::UnusedCorrelated(records) => self.physics.unused = records,
            CardSet::Normalization(records) => self.physics.normalization = records,
            CardSet::DataReduction(records) => self.physics.data_reduction = records,
            CardSet::Orres(records) => self.physics.orres = records.into_iter().next(),
            CardSet::Paramagnetic(records) => self.physics.paramagnetic = records,
            CardSet::UserResolution(records) => self.physics.user_resolution = records.into_iter().next(),
        }
    }

    fn apply_abundance(&mut self, record: IsotopeRecord) {
        let existing = self.isotopes.iter().position(|i| i.matches_mass(record.mass))
            .or_else(|| self.isotopes.iter().position(|i| i.abundance.is_none()));

        match existing {
            Some(idx) => {
                tracing::debug!(isotope = %self.isotopes[idx].name, mass = record.mass, "updating isotope abundance");
                self.isotopes[idx].abundance = Some(record);
            },
            None => {
                let mut iso = Isotope::new(format!("??-{}", record.mass));
                tracing::debug!(isotope = %iso.name, "adding isotope from abundance card");
                iso.abundance = Some(record);
                self.isotopes.push(iso);
            }
        }
    }

    fn apply_resonances(&mut self, records: Vec<ResonanceRecord>) {
        self.default_isotope();
        self.isotopes.iter_mut().for_each(|i| i.resonances.clear());
        self.resonance_order.clear();

        for res in records {
            let idx = self.isotopes.iter()
                .position(|i| i.spin_groups().contains(&res.spin_group))
                .unwrap_or(0);
            self.isotopes[idx].resonances.push(res);
            self.resonance_order.push(idx);
        }
    }

    /// Every resonance, in the order they were read. Resonances added to an
    /// isotope since then follow, isotope by isotope.
    fn resonances_in_file_order(&self) -> Vec<ResonanceRecord> {
        let mut cursors = vec![0; self.isotopes.len()];
        let mut resonances = vec![];
        for &idx in &self.resonance_order {
            let Some(res) = self.isotopes.get(idx).and_then(|i| i.resonances.get(cursors[idx])) else { continue };
            resonances.push(res.clone());
            cursors[idx] += 1;
        }
        for (iso, start) in self.isotopes.iter().zip(cursors) {
            resonances.extend(iso.resonances.iter().skip(start).cloned());
        }
        resonances
    }

    fn apply_radii(&mut self, records: Vec<RadiusRecord>) {
        self.default_isotope();
        self.isotopes.iter_mut().for_each(|i| i.radii.clear());

        for radius in records {
            let targets: Vec<usize> = match radius.channels.group_numbers() {
                None => (0..self.isotopes.len()).collect(),
                Some(groups) => self.isotopes.iter()
                    .enumerate()
                    .filter(|(_, iso)| iso.spin_groups().iter().any(|g| groups.contains(g)))
                    .map(|(idx, _)| idx)
                    .collect(),
            };
            let targets = if targets.is_empty() { vec![0] } else { targets };

            tracing::debug!(radius = radius.effective_radius, isotopes = targets.len(), "assigned radius");
            for idx in targets {
                self.isotopes[idx].radii.push(radius.clone());
            }
        }
    }

    fn apply_fixed_radii(&mut self, records: Vec<FixedRadiusRecord>) {
        self.default_isotope();
        self.isotopes.iter_mut().for_each(|i| i.fixed_radii.clear());

        for radius in records {
            let mut targets: Vec<usize> = self.isotopes.iter()
                .enumerate()
                .filter(|(_, iso)| iso.spin_groups().iter().any(|g| radius.spin_groups.contains(g)))
                .map(|(idx, _)| idx)
                .collect();
            if targets.is_empty() {
                targets.push(0);
            }

            tracing::debug!(radius = radius.effective_radius, isotopes = targets.len(), "assigned fixed-column radius");
            for idx in targets {
                self.isotopes[idx].fixed_radii.push(radius.clone());
            }
        }
    }

    fn apply_particle_pairs(&mut self, records: Vec<ParticlePairRecord>) {
        self.default_isotope();
        self.isotopes.iter_mut().for_each(|i| i.particle_pairs.clear());

        for pair in records {
            let idx = self.isotopes.iter()
                .position(|i| i.matches_mass(pair.mass_a) || i.matches_mass(pair.mass_b))
                .unwrap_or(0);
            tracing::debug!(pair = %pair.name, isotope = %self.isotopes[idx].name, "assigned particle pair");
            self.isotopes[idx].particle_pairs.push(pair);
        }
    }

    /// Flatten the model back into card sets, in canonical file order.
    ///
    /// A radius shared by several isotopes is written once. Resonances keep
    /// the order they were read in.
    pub fn card_sets(&self) -> Vec<CardSet> {
        let radii = unique(self.isotopes.iter().flat_map(|i| i.radii.iter()));
        let fixed_radii = unique(self.isotopes.iter().flat_map(|i| i.fixed_radii.iter()));

        let abundances: Vec<IsotopeRecord> = self.isotopes.iter()
            .filter_map(|i| i.abundance.clone())
            .collect();

        let pairs: Vec<ParticlePairRecord> = self.isotopes.iter()
            .flat_map(|i| i.particle_pairs.iter().cloned())
            .collect();

        let p = &self.physics;
        let cards = [
            CardSet::Resonance(self.resonances_in_file_order()),
            CardSet::ExternalR(p.external_r.clone()),
            CardSet::CompactExternalR(p.compact_external_r.clone()),
            CardSet::Broadening(p.broadening.iter().cloned().collect()),
            CardSet::UnusedCorrelated(p.unused.clone()),
            CardSet::Normalization(p.normalization.clone()),
            CardSet::FixedRadii(fixed_radii),
            CardSet::Radii(radii),
            CardSet::DataReduction(p.data_reduction.clone()),
            CardSet::Orres(p.orres.iter().cloned().collect()),
            CardSet::IsotopeAbundance(abundances),
            CardSet::Paramagnetic(p.paramagnetic.clone()),
            CardSet::UserResolution(p.user_resolution.iter().cloned().collect()),
            CardSet::ParticlePair(pairs),
        ];
        cards.into_iter().filter(|c| !c.is_empty()).collect()
    }

    /// Whether any radius of the model applies to every spin group.
    pub fn has_global_radius(&self) -> bool {
        self.isotopes.iter()
            .flat_map(|i| i.radii.iter())
            .any(|r| r.channels == ChannelAssignment::Global)
    }
}

fn unique<'a, T: PartialEq + Clone + 'a>(records: impl Iterator<Item = &'a T>) -> Vec<T> {
    let mut out: Vec<T> = vec![];
    for rec in records {
        if !out.contains(rec) {
            out.push(rec.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card_error::CardResult;
    use crate::cards::GroupChannels;
    use crate::numeric::VaryFlag;

    fn isotope_card() -> CardSet {
        CardSet::IsotopeAbundance(vec![
            IsotopeRecord { mass: 180.948, abundance: 0.99988, uncertainty: None, flag: VaryFlag::No, spin_groups: vec![1, 2] },
            IsotopeRecord { mass: 179.947, abundance: 0.00012, uncertainty: None, flag: VaryFlag::No, spin_groups: vec![3] },
        ])
    }

    fn resonance(energy: f64, spin_group: i64) -> ResonanceRecord {
        ResonanceRecord {
            energy,
            capture_width: 50.0,
            channel1_width: Some(1.0),
            channel2_width: None,
            channel3_width: None,
            vary_energy: VaryFlag::No,
            vary_capture_width: VaryFlag::No,
            vary_channel1: VaryFlag::No,
            vary_channel2: VaryFlag::No,
            vary_channel3: VaryFlag::No,
            spin_group,
        }
    }

    fn radius(r: f64, channels: ChannelAssignment) -> RadiusRecord {
        RadiusRecord { effective_radius: r, true_radius: Some(r), channels, ..Default::default() }
    }

    #[test]
    fn test_resonances_follow_spin_groups() {
        let mut model = ParameterModel::default();
        model.apply(isotope_card());
        model.apply(CardSet::Resonance(vec![resonance(1.0, 1), resonance(2.0, 3), resonance(3.0, 7)]));

        assert_eq!(model.isotopes.len(), 2);
        let energies = |i: usize| model.isotopes[i].resonances.iter().map(|r| r.energy).collect::<Vec<_>>();
        assert_eq!(energies(0), vec![1.0, 3.0], "A resonance in an unknown spin group goes to the first isotope");
        assert_eq!(energies(1), vec![2.0]);
    }

    #[test]
    fn test_radii_shared_and_deduplicated() {
        let mut model = ParameterModel::default();
        model.apply(isotope_card());
        model.apply(CardSet::Radii(vec![
            radius(4.1, ChannelAssignment::Global),
            radius(5.2, ChannelAssignment::Groups(vec![GroupChannels { group: 3, channels: vec![1] }])),
        ]));

        assert_eq!(model.isotopes[0].radii.len(), 1);
        assert_eq!(model.isotopes[1].radii.len(), 2, "The second isotope gets the global radius and its own");
        assert!(model.has_global_radius());

        let radii = model.card_sets().into_iter()
            .find(|c| c.family() == CardFamily::Radii)
            .map(|c| c.len());
        assert_eq!(radii, Some(2), "The global radius must be written once");
    }

    #[test]
    fn test_resonance_order_kept() -> CardResult<()> {
        let lines = [
            " 1.0000E+00 5.0000E+01 1.0000E+00                       0 0 0     1",
            " 2.0000E+00 5.0000E+01 1.0000E+00                       0 0 0     3",
            " 3.0000E+00 5.0000E+01 1.0000E+00                       0 0 0     1",
            "",
            "ISOTOpic abundances and masses",
            "180.948   0.9998800 1.000E-05 1 1 2",
            "179.947   1.200E-04            0 3",
            "",
        ];
        let file = ParameterFile::from_lines(&lines)?;
        let mut model = ParameterModel::from_file(&file);
        assert_eq!(model.isotopes[0].resonances.len(), 2);
        assert_eq!(model.to_file().card(CardFamily::Resonance), file.card(CardFamily::Resonance));

        model.isotopes[0].resonances.push(resonance(0.5, 2));
        let Some(CardSet::Resonance(written)) = model.to_file().card(CardFamily::Resonance).cloned() else {
            panic!("The resonance card was not written");
        };
        let energies: Vec<f64> = written.iter().map(|r| r.energy).collect();
        assert_eq!(energies, vec![1.0, 2.0, 3.0, 0.5], "A resonance added after reading goes last");
        Ok(())
    }

    #[test]
    fn test_fixed_radii_by_spin_group() {
        let mut model = ParameterModel::default();
        model.apply(isotope_card());
        let fixed = |r: f64, spin_groups: Vec<i64>| FixedRadiusRecord {
            effective_radius: r,
            true_radius: r,
            spin_groups,
            ..Default::default()
        };
        model.apply(CardSet::FixedRadii(vec![fixed(3.2, vec![1, 2]), fixed(4.4, vec![3]), fixed(5.1, vec![2, 3])]));

        assert_eq!(model.isotopes[0].fixed_radii.len(), 2);
        assert_eq!(model.isotopes[1].fixed_radii.len(), 2);
        let written = model.card_sets().into_iter()
            .find(|c| c.family() == CardFamily::FixedRadii)
            .map(|c| c.len());
        assert_eq!(written, Some(3), "A radius shared by both isotopes must be written once");
    }

    #[test]
    fn test_physics_cards_in_canonical_order() {
        let mut model = ParameterModel::default();
        model.apply(CardSet::Orres(vec![OrresRecord::default()]));
        model.apply(CardSet::ExternalR(vec![ExternalRRecord {
            spin_group: 1,
            channel: 1,
            e_down: 1.0,
            e_up: 2.0,
            r_con: 0.1,
            r_lin: 0.2,
            s_alpha: 0.3,
            vary_e_down: VaryFlag::No,
            vary_e_up: VaryFlag::No,
            vary_r_con: VaryFlag::No,
            vary_r_lin: VaryFlag::No,
            vary_s_alpha: VaryFlag::No,
        }]));
        model.apply(CardSet::Resonance(vec![resonance(1.0, 1)]));

        let families: Vec<CardFamily> = model.card_sets().iter().map(|c| c.family()).collect();
        assert_eq!(families, vec![CardFamily::Resonance, CardFamily::ExternalR, CardFamily::Orres]);
    }

    #[test]
    fn test_particle_pairs_by_mass() {
        let mut model = ParameterModel::default();
        model.apply(isotope_card());
        let pair = |name: &str, mass_b: f64| ParticlePairRecord {
            name: name.to_owned(),
            particle_a: "neutron".to_owned(),
            particle_b: "other".to_owned(),
            mass_a: 1.008664915,
            mass_b,
            ..Default::default()
        };
        model.apply(CardSet::ParticlePair(vec![pair("Ta180", 179.9474), pair("Elsewhere", 12.0)]));

        assert_eq!(model.isotopes[1].particle_pairs.len(), 1);
        assert_eq!(model.isotopes[1].particle_pairs[0].name, "Ta180");
        assert_eq!(model.isotopes[0].particle_pairs[0].name, "Elsewhere");
    }

    #[test]
    fn test_placeholder_isotope() {
        let mut model = ParameterModel::default();
        model.apply(CardSet::Resonance(vec![resonance(1.0, 1)]));
        assert_eq!(model.isotopes.len(), 1);
        assert_eq!(model.isotopes[0].name, UNKNOWN_ISOTOPE);

        model.apply(CardSet::IsotopeAbundance(vec![
            IsotopeRecord { mass: 55.935, abundance: 0.9175, uncertainty: None, flag: VaryFlag::Yes, spin_groups: vec![1] },
        ]));
        assert_eq!(model.isotopes.len(), 1, "The abundance record should fill the placeholder");
        assert_eq!(model.isotopes[0].mass(), Some(55.935));
    }

    #[test]
    fn test_file_round_trip() -> CardResult<()> {
        let lines = [
            "-3.6616E+06 1.5877E+05 3.6985E+09                       0 0 1     1",
            " 6.6720E+03 1.5000E+02-4.6894E+01 1.0000E+00            1 1 3 0   3",
            "",
            "NORMAlization and background are next",
            "1.000E+00 2.000E-02 3.000E-03 4.000E-04 5.000E-05 6.000E-06  1 0 1 0 1 0",
            "",
            "RADII are in KEY-WORD format",
            "Radii= 4.1, 4.1 Flags= 0, 0",
            "",
            "ISOTOpic abundances and masses",
            "180.948   0.9998800 1.000E-05 1 1 2",
            "179.947   1.200E-04            0 3",
            "",
        ];
        let file = ParameterFile::from_lines(&lines)?;
        let model = ParameterModel::from_file(&file);
        assert_eq!(model.isotopes[1].resonances.len(), 1, "The spin group 3 resonance belongs to the second isotope");
        assert_eq!(model.physics.normalization.len(), 1);

        let back = model.to_file();
        assert_eq!(back.cards.len(), 4);
        assert_eq!(ParameterFile::from_lines(&back.to_lines()?)?, back);
        assert_eq!(back.card(CardFamily::Normalization), file.card(CardFamily::Normalization));
        Ok(())
    }
}
