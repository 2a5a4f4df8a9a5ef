//! ユーザーコマンド

use crate::errors::USAGE_TRANSLATE_ADDRESS;
use crate::parse::parse_address;
use crate::Result;
use enkel_paging::{walk, Walk};
use enkel_target::DebugBackend;

/// アドレス変換コマンドの名前
pub const TRANSLATE_ADDRESS: &str = "translate_address";

/// `translate_address <address>`
///
/// 現在のCR3でページテーブルを辿り、各レベルのエントリと変換結果を表示します。
/// 引数が解釈できない場合は使い方を表示するだけで、エラーにはしません。
pub fn translate_address(backend: &mut dyn DebugBackend, args: &str) -> Result<()> {
    let virtual_address = match parse_address(args) {
        Ok(address) => address,
        Err(_) => {
            backend.print(USAGE_TRANSLATE_ADDRESS);
            return Ok(());
        }
    };

    let cr3 = backend.evaluate("$cr3")?;
    let trace = walk(&mut *backend, cr3, virtual_address);
    for line in render_walk(&trace) {
        backend.print(&line);
    }
    Ok(())
}

/// ウォークの結果を表示用の行にする
pub fn render_walk(trace: &Walk) -> Vec<String> {
    let mut lines: Vec<String> = trace
        .steps
        .iter()
        .map(|step| format!("{:>4} @0x{:x}: {}", step.level.name(), step.entry_address, step.entry))
        .collect();

    lines.push(match &trace.outcome {
        Ok(physical) => format!(
            "Virtual address 0x{:x} translates to physical address 0x{:x}",
            trace.virtual_address, physical
        ),
        Err(e) => format!(
            "Virtual address 0x{:x} is not mapped: {}",
            trace.virtual_address, e
        ),
    });
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use enkel_target::SimTarget;

    #[test]
    fn test_bad_argument_prints_usage() {
        let mut sim = SimTarget::new();
        translate_address(&mut sim, "").unwrap();
        translate_address(&mut sim, "nowhere").unwrap();
        assert_eq!(sim.output(), [USAGE_TRANSLATE_ADDRESS, USAGE_TRANSLATE_ADDRESS]);
        assert!(sim.reads().is_empty());
    }

    #[test]
    fn test_unmapped_root_reports_level() {
        let mut sim = SimTarget::new();
        sim.set_register("cr3", 0x1000);
        // PML4テーブルは全て0
        sim.memory_mut().write(enkel_target::AddressSpace::Physical, 0x1000, &[0u8; 4096]);

        translate_address(&mut sim, "0x400000").unwrap();
        let last = sim.output().last().unwrap();
        assert_eq!(last, "Virtual address 0x400000 is not mapped: PML4 entry not present");
    }
}
