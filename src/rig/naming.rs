//! Node names derived from the rig name and chain label.
//!
//! Every name a rig creates comes from here so that building, recompiling
//! and deleting agree on them.

/// Shared top group holding every rig.
pub const MASTER_GRP_NAME: &str = "Sine_Grp";
/// Shared root set holding every rig's set.
pub const MAIN_SET_NAME: &str = "Sine_Main_Set";

const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Bijective base-26 label: 0 → "A", 25 → "Z", 26 → "AA", 27 → "AB".
#[must_use]
pub fn alphabet_label(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(ALPHABET[rem]);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Inverse of [`alphabet_label`]; `None` for anything but uppercase letters.
#[must_use]
pub fn label_index(label: &str) -> Option<usize> {
    if label.is_empty() || !label.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let mut n = 0_usize;
    for byte in label.bytes() {
        n = n.checked_mul(26)?.checked_add(usize::from(byte - b'A') + 1)?;
    }
    Some(n - 1)
}

/// Names owned by one rig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigNames {
    name: String,
}

impl RigNames {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn rig(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn element_group(&self) -> String {
        format!("Sine_{}", self.name)
    }

    #[must_use]
    pub fn master_control(&self) -> String {
        format!("Sine_{}_MCtl", self.name)
    }

    #[must_use]
    pub fn annotation(&self) -> String {
        format!("Sine_{}_annotation", self.name)
    }

    #[must_use]
    pub fn rig_set(&self) -> String {
        format!("Sine_{}_Sets", self.name)
    }

    #[must_use]
    pub fn fk_set(&self) -> String {
        format!("Sine_{}_FK_sets", self.name)
    }

    #[must_use]
    pub fn ik_set(&self) -> String {
        format!("Sine_{}_IK_sets", self.name)
    }

    #[must_use]
    pub fn expression_set(&self) -> String {
        format!("Sine_{}_EXP_sets", self.name)
    }

    #[must_use]
    pub fn bake_set(&self) -> String {
        format!("Sine_{}_Bake_sets", self.name)
    }

    #[must_use]
    pub fn chain(&self, chain_index: usize, joint_count: usize) -> ChainNames {
        ChainNames::new(&self.name, chain_index, joint_count)
    }

    /// Names a build creates outside its chains; the shared group and set
    /// are not included.
    #[must_use]
    pub fn node_names(&self) -> Vec<String> {
        let master = self.master_control();
        vec![
            self.element_group(),
            tag_name(&master),
            master,
            self.annotation(),
            self.rig_set(),
            self.fk_set(),
            self.ik_set(),
            self.expression_set(),
            self.bake_set(),
        ]
    }

    /// Chain label parsed back from an FK group name of this rig.
    #[must_use]
    pub fn label_from_fk_group(&self, group: &str) -> Option<String> {
        let label = group
            .strip_prefix(&format!("Sine_{}_", self.name))?
            .strip_suffix("_FK")?;
        label_index(label).map(|_| label.to_owned())
    }
}

/// Joint tier within one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointTier {
    Offset,
    Expression,
    Final,
    SplineIk,
}

impl JointTier {
    pub(crate) const fn suffix(self) -> &'static str {
        match self {
            Self::Offset => "_offset_jnt",
            Self::Expression => "_exp_jnt",
            Self::Final => "_jnt",
            Self::SplineIk => "_SIK_jnt",
        }
    }
}

/// Names for one chain of a rig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainNames {
    pub label: String,
    base: String,
    /// Number of driven objects; the tip joint sits at this index.
    joint_count: usize,
}

impl ChainNames {
    #[must_use]
    pub fn new(rig: &str, chain_index: usize, joint_count: usize) -> Self {
        let label = alphabet_label(chain_index);
        Self {
            base: format!("Sine_{rig}_{label}"),
            label,
            joint_count,
        }
    }

    /// `Sine_{rig}_{label}`, also the name of the chain group.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn fk_group(&self) -> String {
        format!("{}_FK", self.base)
    }

    #[must_use]
    pub fn fk_setup(&self) -> String {
        format!("{}_FK_Setup", self.base)
    }

    #[must_use]
    pub fn sik_group(&self) -> String {
        format!("{}_SIK", self.base)
    }

    #[must_use]
    pub fn sik_setup(&self) -> String {
        format!("{}_SIK_Setup", self.base)
    }

    /// Joint name; `index == joint_count` is the tip.
    #[must_use]
    pub fn joint(&self, index: usize, tier: JointTier) -> String {
        let digits = if self.joint_count > 100 {
            format!("{index:03}")
        } else {
            format!("{index:02}")
        };
        let tip = if index == self.joint_count { "_TIP" } else { "" };
        format!("{}_{digits}{}{tip}", self.base, tier.suffix())
    }

    #[must_use]
    pub fn fk_control(&self, index: usize) -> String {
        format!("{}_{index}_Ctl", self.fk_group())
    }

    #[must_use]
    pub fn ik_control_group(&self, index: usize) -> String {
        format!("{}_{index}_CGrp", self.sik_group())
    }

    #[must_use]
    pub fn ik_control(&self, index: usize) -> String {
        format!("{}_{index}_Ctl", self.sik_group())
    }

    #[must_use]
    pub fn ik_control_joint(&self, index: usize) -> String {
        format!("{}_{index}_CJnt", self.sik_group())
    }

    #[must_use]
    pub fn handle(&self) -> String {
        format!("{}_handle", self.sik_group())
    }

    #[must_use]
    pub fn effector(&self) -> String {
        format!("{}_effector", self.sik_group())
    }

    #[must_use]
    pub fn curve(&self) -> String {
        format!("{}_curve", self.sik_group())
    }

    #[must_use]
    pub fn skin_cluster(&self) -> String {
        format!("{}_curveShape_skinCluster", self.sik_group())
    }

    #[must_use]
    pub fn expression(&self) -> String {
        format!("{}_exp", self.joint(0, JointTier::Expression))
    }

    #[must_use]
    pub fn fk_set(&self) -> String {
        format!("{}_sets", self.fk_group())
    }

    #[must_use]
    pub fn ik_set(&self) -> String {
        format!("{}_sets", self.sik_group())
    }

    /// Every name this chain creates when built with `ik_count` curve
    /// controls, constraints on the driven objects excluded.
    #[must_use]
    pub fn node_names(&self, ik_count: usize) -> Vec<String> {
        let mut names = vec![
            self.base.clone(),
            self.fk_group(),
            self.fk_setup(),
            self.sik_group(),
            self.sik_setup(),
            self.handle(),
            self.effector(),
            self.curve(),
            self.skin_cluster(),
            self.expression(),
            self.fk_set(),
            self.ik_set(),
        ];
        for index in 0..=self.joint_count {
            for tier in [JointTier::Offset, JointTier::Expression, JointTier::Final, JointTier::SplineIk] {
                names.push(self.joint(index, tier));
            }
        }
        for index in 0..self.joint_count {
            let control = self.fk_control(index);
            names.push(tag_name(&control));
            names.push(control);
        }
        for index in 0..ik_count {
            let control = self.ik_control(index);
            names.push(self.ik_control_group(index));
            names.push(self.ik_control_joint(index));
            names.push(tag_name(&control));
            names.push(control);
        }
        names
    }
}

/// Name of the controller tag of `control`.
#[must_use]
pub fn tag_name(control: &str) -> String {
    format!("{control}_tag")
}

/// Name of the temporary parent constraint on a driven object.
#[must_use]
pub fn constraint_name(slave: &str) -> String {
    format!("{slave}_tempCns")
}
