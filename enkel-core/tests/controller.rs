use enkel_core::{Controller, ControllerConfig, ControllerState, HookKind};
use enkel_target::{AddressSpace, DebugBackend, SimTarget, StopDecision};

const ENTRY: u64 = 0xffff_8000_0000_1000;
const NAME_PTR: u64 = 0xffff_8000_0020_0000;

/// Enkelカーネルのシンボルを全て定義したターゲット
fn kernel_target() -> SimTarget {
    let mut sim = SimTarget::new();
    sim.define_symbol("OnKernelMainHook", ENTRY);
    let config = ControllerConfig::default();
    for (i, spec) in config.hooks.iter().enumerate() {
        sim.define_symbol(&spec.name, ENTRY + 0x100 * (i as u64 + 1));
    }
    sim
}

fn armed_controller(sim: &mut SimTarget) -> Controller {
    let mut controller = Controller::install(sim, ControllerConfig::default()).unwrap();
    let gate = sim.hook_at(ENTRY).unwrap();
    assert_eq!(controller.on_stop(sim, gate), StopDecision::Resume);
    sim.clear_history();
    controller
}

fn hook_id(controller: &Controller, name: &str) -> enkel_target::HookId {
    controller.hooks().find(name).unwrap().id
}

#[test]
fn test_install_runs_preamble_and_sets_only_entry_gate() {
    let mut sim = kernel_target();
    let controller = Controller::install(&mut sim, ControllerConfig::default()).unwrap();

    assert_eq!(controller.state(), ControllerState::Unarmed);
    assert!(!controller.debugger_attached());
    assert_eq!(sim.executed(), ControllerConfig::default().preamble.as_slice());
    assert_eq!(sim.breakpoint_addresses(), vec![ENTRY]);
}

#[test]
fn test_install_fails_without_entry_gate() {
    let mut sim = SimTarget::new();
    assert!(Controller::install(&mut sim, ControllerConfig::default()).is_err());
}

#[test]
fn test_entry_gate_arms_once() {
    let mut sim = kernel_target();
    let mut controller = Controller::install(&mut sim, ControllerConfig::default()).unwrap();
    let gate = sim.hook_at(ENTRY).unwrap();

    assert_eq!(controller.on_stop(&mut sim, gate), StopDecision::Resume);
    assert_eq!(controller.state(), ControllerState::Armed);
    assert!(controller.debugger_attached());
    assert_eq!(sim.variable("GIsDebuggerPresent"), Some(1));
    assert_eq!(sim.output(), ["Debugger attached"]);

    let installed = sim.breakpoint_addresses().len();
    assert_eq!(installed, 1 + ControllerConfig::default().hooks.len());

    // 2回目の到達では再設定しない
    assert_eq!(controller.on_stop(&mut sim, gate), StopDecision::Resume);
    assert_eq!(sim.breakpoint_addresses().len(), installed);
    assert_eq!(sim.output(), ["Debugger attached"]);
}

#[test]
fn test_unresolved_hook_is_skipped() {
    let mut sim = SimTarget::new();
    sim.define_symbol("OnKernelMainHook", ENTRY);
    sim.define_symbol("ISR_PageFault", ENTRY + 0x100);

    let mut controller = Controller::install(&mut sim, ControllerConfig::default()).unwrap();
    let gate = sim.hook_at(ENTRY).unwrap();
    assert_eq!(controller.on_stop(&mut sim, gate), StopDecision::Resume);

    assert_eq!(controller.state(), ControllerState::Armed);
    assert_eq!(sim.breakpoint_addresses(), vec![ENTRY, ENTRY + 0x100]);
    assert_eq!(
        controller.hooks().find("ISR_PageFault").map(|h| h.kind),
        Some(HookKind::FaultVerbose)
    );
}

#[test]
fn test_translate_command_registered_on_arm() {
    let mut sim = kernel_target();
    let _controller = armed_controller(&mut sim);
    sim.run_command("translate_address bogus").unwrap();
    assert_eq!(sim.output(), ["Usage: translate_address <address>"]);
}

#[test]
fn test_verbose_fault_prints_state_and_stack() {
    let mut sim = kernel_target();
    let mut controller = armed_controller(&mut sim);
    let id = hook_id(&controller, "ISR_PageFault");

    assert_eq!(controller.on_stop(&mut sim, id), StopDecision::Stop);
    assert_eq!(sim.output(), ["Top of stack for ISR_PageFault:"]);
    assert_eq!(sim.executed(), ["info break", "x/16gx $rsp"]);
}

#[test]
fn test_silent_fault_prints_stack_only() {
    let mut sim = kernel_target();
    let mut controller = armed_controller(&mut sim);
    let id = hook_id(&controller, "ISR_InvalidOpcode");

    assert_eq!(controller.on_stop(&mut sim, id), StopDecision::Stop);
    assert_eq!(sim.executed(), ["x/16gx $rsp"]);
}

#[test]
fn test_generic_stop_hook() {
    let mut sim = kernel_target();
    let mut controller = armed_controller(&mut sim);
    let id = hook_id(&controller, "HaltPermanently");

    assert_eq!(controller.on_stop(&mut sim, id), StopDecision::Stop);
    assert_eq!(sim.output(), ["HaltPermanently hit"]);
    assert!(sim.executed().is_empty());
}

#[test]
fn test_unknown_hook_stops() {
    let mut sim = kernel_target();
    let mut controller = armed_controller(&mut sim);
    let stray = sim.install_breakpoint(0x1234).unwrap();
    assert_eq!(controller.on_stop(&mut sim, stray), StopDecision::Stop);
}

fn stage_module(sim: &mut SimTarget, name: &str, base: u64) {
    sim.memory_mut().write_utf16(AddressSpace::Virtual, NAME_PTR, name);
    sim.set_frame_value(1, "programName", NAME_PTR);
    sim.set_frame_value(1, "imageBase", base);
}

#[test]
fn test_module_load_then_unload_restores_tracked_set() {
    let mut sim = kernel_target();
    let mut controller = armed_controller(&mut sim);
    let load = hook_id(&controller, "OnBinaryLoadHook_Inner");
    let unload = hook_id(&controller, "OnBinaryUnloadHook_Inner");

    let before: Vec<_> = controller.modules().loaded().cloned().collect();

    stage_module(&mut sim, "foo", 0x1000);
    assert_eq!(controller.on_stop(&mut sim, load), StopDecision::Resume);
    let names: Vec<_> = controller.modules().loaded().map(|m| m.name.clone()).collect();
    assert_eq!(names, ["foo"]);

    assert_eq!(controller.on_stop(&mut sim, unload), StopDecision::Resume);
    let after: Vec<_> = controller.modules().loaded().cloned().collect();
    assert_eq!(before, after);

    assert_eq!(
        sim.executed(),
        [
            "add-symbol-file boot_iso/boot_part/foo -o 0x1000 -readnow",
            "remove-symbol-file boot_iso/boot_part/foo",
        ]
    );
}

#[test]
fn test_module_reload_at_same_base_replaces_symbols() {
    let mut sim = kernel_target();
    let mut controller = armed_controller(&mut sim);
    let load = hook_id(&controller, "OnBinaryLoadHook_Inner");

    stage_module(&mut sim, "/apps/a.elf", 0x40_0000);
    controller.on_stop(&mut sim, load);
    stage_module(&mut sim, "/apps/b.elf", 0x40_0000);
    controller.on_stop(&mut sim, load);

    assert_eq!(controller.modules().loaded().count(), 1);
    assert_eq!(
        sim.executed(),
        [
            "add-symbol-file boot_iso/boot_part/a.elf -o 0x400000 -readnow",
            "remove-symbol-file boot_iso/boot_part/a.elf",
            "add-symbol-file boot_iso/boot_part/b.elf -o 0x400000 -readnow",
        ]
    );
}

#[test]
fn test_unload_of_untracked_module_issues_nothing() {
    let mut sim = kernel_target();
    let mut controller = armed_controller(&mut sim);
    let unload = hook_id(&controller, "OnBinaryUnloadHook_Inner");

    stage_module(&mut sim, "ghost", 0x9000);
    assert_eq!(controller.on_stop(&mut sim, unload), StopDecision::Resume);
    assert!(sim.executed().is_empty());
}

#[test]
fn test_module_decode_failure_still_resumes() {
    let mut sim = kernel_target();
    let mut controller = armed_controller(&mut sim);
    let load = hook_id(&controller, "OnBinaryLoadHook_Inner");

    // 名前のポインタが未マップのメモリを指す
    sim.set_frame_value(1, "programName", 0xdead_0000);
    sim.set_frame_value(1, "imageBase", 0x1000);

    assert_eq!(controller.on_stop(&mut sim, load), StopDecision::Resume);
    assert_eq!(controller.modules().loaded().count(), 0);
    assert!(sim.executed().is_empty());
    assert_eq!(sim.output().len(), 1);
}

#[test]
fn test_module_name_at_end_of_address_space_still_resumes() {
    let mut sim = kernel_target();
    let mut controller = armed_controller(&mut sim);
    let load = hook_id(&controller, "OnBinaryLoadHook_Inner");

    sim.memory_mut().write(AddressSpace::Virtual, 0xFFFF_FFFF_FFFF_FFFE, &[0x41, 0x00]);
    sim.set_frame_value(1, "programName", 0xFFFF_FFFF_FFFF_FFFE);
    sim.set_frame_value(1, "imageBase", 0x1000);

    assert_eq!(controller.on_stop(&mut sim, load), StopDecision::Resume);
    assert_eq!(controller.modules().loaded().count(), 0);
    assert!(sim.executed().is_empty());
}

#[test]
fn test_failed_symbol_removal_keeps_module_tracked() {
    let mut sim = kernel_target();
    let mut controller = armed_controller(&mut sim);
    let load = hook_id(&controller, "OnBinaryLoadHook_Inner");
    let unload = hook_id(&controller, "OnBinaryUnloadHook_Inner");

    stage_module(&mut sim, "/apps/shell.elf", 0x40_0000);
    assert_eq!(controller.on_stop(&mut sim, load), StopDecision::Resume);

    sim.fail_commands("remove-symbol-file");
    assert_eq!(controller.on_stop(&mut sim, unload), StopDecision::Resume);
    let names: Vec<&str> = controller.modules().loaded().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["/apps/shell.elf"]);
}
