//! IO for .bench (ISCAS) files

use std::io::{BufRead, BufReader, Read, Write};

use anyhow::{anyhow, bail, ensure, Context, Result};
use fxhash::FxHashMap;
use itertools::Itertools;
use volute::Lut;

use crate::network::{BinaryType, NaryType, TernaryType};
use crate::{Gate, Network, Signal};

use super::utils::{get_inverted_signals, sig_to_string};

type Statement = Vec<String>;

fn build_name_to_sig(
    statements: &[Statement],
    inputs: &[String],
) -> Result<FxHashMap<String, Signal>> {
    let mut ret = FxHashMap::default();
    for (i, name) in inputs.iter().enumerate() {
        let present = ret
            .insert(name.clone(), Signal::from_input(i as u32))
            .is_some();
        ensure!(!present, "{name} is defined twice");
    }
    for (i, s) in statements.iter().enumerate() {
        let present = ret
            .insert(s[0].to_string(), Signal::from_var(i as u32))
            .is_some();
        ensure!(!present, "{} is defined twice", s[0]);
    }

    // ABC-style naming for constant signals
    ret.entry("vdd".to_string()).or_insert(Signal::one());
    ret.entry("gnd".to_string()).or_insert(Signal::zero());
    Ok(ret)
}

fn check_statement(statement: &Statement, name_to_sig: &FxHashMap<String, Signal>) -> Result<()> {
    let deps = &statement[2..];
    for dep in deps {
        ensure!(
            name_to_sig.contains_key(dep),
            "Gate input {dep} is not generated anywhere"
        );
    }
    let expected = match statement[1].to_uppercase().as_str() {
        "DFF" | "BUF" | "BUFF" | "NOT" => Some(1),
        "VDD" | "VSS" | "GND" => Some(0),
        "MUX" | "MAJ" => Some(3),
        "DFFRSE" => Some(4),
        _ => None,
    };
    if let Some(n) = expected {
        ensure!(
            deps.len() == n,
            "{} gate {} has {} inputs, expected {n}",
            statement[1],
            statement[0],
            deps.len()
        );
    }
    Ok(())
}

fn network_from_statements(
    statements: &[Statement],
    inputs: &[String],
    outputs: &[String],
) -> Result<Network> {
    let mut ret = Network::new();
    ret.add_inputs(inputs.len());

    // Compute a mapping between the two
    let name_to_sig = build_name_to_sig(statements, inputs)?;

    // Check everything
    for statement in statements {
        check_statement(statement, &name_to_sig)?;
    }
    for output in outputs {
        ensure!(
            name_to_sig.contains_key(output),
            "Output {output} is not generated anywhere"
        );
    }

    // Setup the variables based on the mapping
    for s in statements {
        let sigs: Vec<Signal> = s[2..].iter().map(|n| name_to_sig[n]).collect();
        let gate = match s[1].to_uppercase().as_str() {
            "DFF" => Gate::dff(sigs[0], Signal::one(), Signal::zero()),
            "DFFRSE" => {
                ensure!(
                    sigs[2] == Signal::zero(),
                    "Flip-flop {} with a set signal is not supported",
                    s[0]
                );
                Gate::dff(sigs[0], sigs[3], sigs[1])
            }
            "BUF" | "BUFF" => Gate::Buf(sigs[0]),
            "NOT" => Gate::Buf(!sigs[0]),
            "VDD" => Gate::Buf(Signal::one()),
            "VSS" | "GND" => Gate::Buf(Signal::zero()),
            "AND" => Gate::nary(&sigs, NaryType::And),
            "NAND" => Gate::nary(&sigs, NaryType::Nand),
            "OR" => Gate::nary(&sigs, NaryType::Or),
            "NOR" => Gate::nary(&sigs, NaryType::Nor),
            "XOR" => Gate::nary(&sigs, NaryType::Xor),
            "XNOR" => Gate::nary(&sigs, NaryType::Xnor),
            "MUX" => Gate::mux(sigs[0], sigs[1], sigs[2]),
            "MAJ" => Gate::maj(sigs[0], sigs[1], sigs[2]),
            _ => {
                if let Some(table) = s[1].strip_prefix("LUT 0x") {
                    let lut = Lut::from_hex_string(sigs.len(), table.trim())
                        .map_err(|_| anyhow!("Invalid truth table {} for {}", table, s[0]))?;
                    Gate::lut(&sigs, lut)
                } else {
                    bail!("Unknown gate type {}", s[1]);
                }
            }
        };
        ret.add(gate);
    }
    for o in outputs {
        ret.add_output(name_to_sig[o]);
    }
    ret.topo_sort();
    ret.check();
    Ok(ret)
}

/// Read a network in .bench format, as used by the ISCAS benchmarks
///
/// These files describe the design with simple statements like:
/// ```text
///     # This is a comment
///     INPUT(i0)
///     INPUT(i1)
///     x0 = AND(i0, i1)
///     x1 = NAND(x0, i1)
///     x2 = OR(x0, i0)
///     x3 = NOR(i0, x1)
///     x4 = XOR(x3, x2)
///     x5 = BUF(x4)
///     x6 = NOT(x5)
///     x7 = gnd
///     x8 = vdd
///     OUTPUT(x0)
/// ```
pub fn read_bench<R: Read>(r: R) -> Result<Network> {
    let mut statements = Vec::new();
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for (lineno, l) in BufReader::new(r).lines().enumerate() {
        let s = l.context("Error during file IO")?;
        let t = s.trim();
        if t.is_empty() || t.starts_with('#') {
            continue;
        }
        if !t.contains('=') {
            let parts: Vec<_> = t
                .split(&['(', ')'])
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect();
            ensure!(parts.len() == 2, "Line {}: invalid statement {t}", lineno + 1);
            if ["INPUT", "PINPUT"].contains(&parts[0]) {
                inputs.push(parts[1].to_string());
            } else if ["OUTPUT", "POUTPUT"].contains(&parts[0]) {
                outputs.push(parts[1].to_string());
            } else {
                bail!("Line {}: unknown keyword {}", lineno + 1, parts[0]);
            }
        } else {
            let parts: Statement = t
                .split(&['=', '(', ',', ')'])
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect();
            ensure!(parts.len() >= 2, "Line {}: invalid gate {t}", lineno + 1);
            statements.push(parts);
        }
    }
    network_from_statements(&statements, &inputs, &outputs)
}

/// Write a network in .bench format, as used by the ISCAS benchmarks
pub fn write_bench<W: Write>(w: &mut W, network: &Network) -> Result<()> {
    writeln!(w, "# .bench (ISCAS) file")?;
    writeln!(w, "# Generated by satpg")?;
    for i in 0..network.nb_inputs() {
        writeln!(w, "INPUT({})", network.input(i))?;
    }
    writeln!(w)?;
    for i in 0..network.nb_outputs() {
        writeln!(w, "OUTPUT({})", sig_to_string(&network.output(i)))?;
    }
    writeln!(w)?;
    for i in 0..network.nb_nodes() {
        use Gate::*;
        let g = network.gate(i);
        let rep = g
            .dependencies()
            .iter()
            .map(sig_to_string)
            .join(", ");
        write!(w, "x{} = ", i)?;
        match g {
            Binary(_, BinaryType::And) | Ternary(_, TernaryType::And) => {
                writeln!(w, "AND({})", rep)?;
            }
            Binary(_, BinaryType::Xor) | Ternary(_, TernaryType::Xor) => {
                writeln!(w, "XOR({})", rep)?;
            }
            Nary(_, tp) => match tp {
                NaryType::And => writeln!(w, "AND({})", rep)?,
                NaryType::Or => writeln!(w, "OR({})", rep)?,
                NaryType::Nand => writeln!(w, "NAND({})", rep)?,
                NaryType::Nor => writeln!(w, "NOR({})", rep)?,
                NaryType::Xor => writeln!(w, "XOR({})", rep)?,
                NaryType::Xnor => writeln!(w, "XNOR({})", rep)?,
            },
            Dff([d, en, res]) => {
                if *en != Signal::one() || *res != Signal::zero() {
                    writeln!(
                        w,
                        "DFFRSE({}, {}, gnd, {})",
                        sig_to_string(d),
                        sig_to_string(res),
                        sig_to_string(en)
                    )?;
                } else {
                    writeln!(w, "DFF({})", sig_to_string(d))?;
                }
            }
            Ternary(_, TernaryType::Mux) => {
                writeln!(w, "MUX({})", rep)?;
            }
            Ternary(_, TernaryType::Maj) => {
                writeln!(w, "MAJ({})", rep)?;
            }
            Buf(s) => {
                if s.is_constant() {
                    writeln!(w, "{}", sig_to_string(s))?;
                } else if s.is_inverted() {
                    writeln!(w, "NOT({})", sig_to_string(&!s))?;
                } else {
                    writeln!(w, "BUF({})", rep)?;
                }
            }
            Lut(lut) => {
                writeln!(w, "LUT 0x{}({})", lut.lut.to_hex_string(), rep)?;
            }
        }
    }

    for s in get_inverted_signals(network) {
        writeln!(w, "{}_n = NOT({})", s, s)?;
    }
    Ok(())
}
