//! Compiles the sine wave that drives a chain's expression joints.
//!
//! Per axis the program declares a handful of shared locals (frequency,
//! falloff, amplitude, bias, delay and the three phase offsets) and then one
//! `raw` local plus one rotate assignment per expression joint. Joint `k`
//! uses wave index `k + 1`, so the root joint already moves a little.

use std::f64::consts::TAU;

use crate::expr::{AttrPath, DriverProgram, Expr};
use crate::scene::SceneGraph;
use crate::scene::node::NodeId;

use super::error::RigError;
use super::master::{AXES, STRENGTH, axis_attr};
use super::spline_ik::{SINE_MULTIPLIER_ATTR, fk_multiplier_attr};

/// Everything the wave of one chain depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveInputs<'a> {
    pub master: &'a str,
    /// First IK control, holder of the multipliers.
    pub ik_control: &'a str,
    /// Expression joints root to tip, tip included.
    pub expression_joints: &'a [String],
    /// Number of driven objects; joints past this have no FK multiplier.
    pub original_joints: usize,
    pub chain_index: usize,
    pub chain_count: usize,
    pub frame_rate: f64,
}

struct AxisLocals {
    falloff: Expr,
    val: Expr,
    bias: Expr,
    delay: Expr,
    phase: Expr,
}

fn master_attr(inputs: &WaveInputs<'_>, base: &str, axis: &str) -> Expr {
    Expr::attr(inputs.master, axis_attr(base, axis))
}

#[allow(clippy::cast_precision_loss)]
fn declare_axis(program: &mut DriverProgram, inputs: &WaveInputs<'_>, axis: &str) -> AxisLocals {
    let joint_count = inputs.expression_joints.len() as f64;
    let chain_index = inputs.chain_index as f64;
    let m = |base: &str| master_attr(inputs, base, axis);

    let freq = program.local(
        format!("freq{axis}"),
        m("loop_per_second") * Expr::constant(TAU) * Expr::Time,
    );
    let falloff = program.local(
        format!("falloff{axis}"),
        m("falloff") * Expr::constant(joint_count) * Expr::constant(0.1),
    );
    let val = program.local(
        format!("val{axis}"),
        m("amp") * Expr::constant(0.1) * (falloff.clone() / Expr::constant(5.0) + Expr::constant(1.0)),
    );
    let bias = program.local(
        format!("bias{axis}"),
        m("amp_bias_range")
            * Expr::noise(
                m("amp_bias_LPS_mult") * freq.clone() + Expr::constant(chain_index + 1.0) * m("amp_bias_noise"),
            ),
    );
    let delay = program.local(format!("delay{axis}"), m("delay") * Expr::constant(-7.0));
    let off = program.local(
        format!("off{axis}"),
        m("offset_frame") / Expr::constant(inputs.frame_rate) * (m("loop_per_second") * Expr::constant(TAU)),
    );
    let noise_off = program.local(
        format!("noiseOff{axis}"),
        m("offset_noise") * Expr::constant(chain_index + 1.0) / Expr::constant(inputs.chain_count as f64),
    );
    let rdm = program.local(
        format!("rdm{axis}"),
        m("offset_rdm") * Expr::noise(m("offset_rdm") + Expr::constant(chain_index)),
    );

    AxisLocals {
        phase: freq + rdm + noise_off + off,
        falloff,
        val,
        bias,
        delay,
    }
}

/// Builds the wave program for one chain.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn compile_chain(inputs: &WaveInputs<'_>) -> DriverProgram {
    let mut program = DriverProgram::new();
    let joint_count = inputs.expression_joints.len() as f64;
    let span = joint_count * 2.0;

    for axis in AXES {
        let locals = declare_axis(&mut program, inputs, axis);

        for (k, joint) in inputs.expression_joints.iter().enumerate() {
            let index = (k + 1) as f64;
            let attenuation = (Expr::constant(index)
                - Expr::clamp(Expr::constant(0.0), Expr::constant(index), locals.falloff.clone()))
                / Expr::constant(span);
            let taper = 1.0 - (index + 1.0) / span;

            let raw = program.local(
                format!("raw{axis}_{}", k + 1),
                Expr::sin(locals.phase.clone() + locals.delay.clone() * attenuation.clone())
                    * Expr::constant(100.0)
                    * (Expr::constant(1.0) + locals.bias.clone())
                    * attenuation
                    * Expr::constant(taper)
                    * locals.val.clone()
                    * Expr::attr(inputs.master, STRENGTH),
            );

            let mut signed = raw.clone()
                * Expr::select_sign(
                    raw,
                    master_attr(inputs, "amp_positive_mult", axis),
                    master_attr(inputs, "amp_negative_mult", axis),
                );
            if k == 0 {
                signed = signed + master_attr(inputs, "amp_offset", axis);
            }

            let mut driven = signed * Expr::attr(inputs.ik_control, SINE_MULTIPLIER_ATTR);
            if k < inputs.original_joints {
                driven = driven * Expr::attr(inputs.ik_control, fk_multiplier_attr(k));
            }
            program.assign(AttrPath::new(joint.as_str(), format!("rotate{axis}")), driven);
        }
    }

    log::debug!(
        "compiled wave for chain {} ({} joints, {} locals)",
        inputs.chain_index,
        inputs.expression_joints.len(),
        program.locals.len()
    );
    program
}

/// Replaces whatever expression drives `joints` with `program`.
pub fn attach(
    scene: &mut dyn SceneGraph,
    name: &str,
    joints: &[NodeId],
    program: DriverProgram,
) -> Result<NodeId, RigError> {
    let mut stale: Vec<NodeId> = joints
        .iter()
        .flat_map(|joint| scene.expressions_targeting(*joint))
        .collect();
    stale.sort_unstable();
    stale.dedup();
    for expression in stale {
        log::debug!("removing stale expression {expression}");
        scene.delete_node(expression)?;
    }
    Ok(scene.create_expression(name, program)?)
}
