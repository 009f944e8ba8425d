//! Integration tests for the bytecode assembler

use raya_assembler::{
    decode_function, disassemble, verify_function, AssemblerOptions, BinaryOp, BytecodeGenerator,
    CompareOp, CompiledFunction, ConstRef, Instr, NameRef, Opcode, UnaryOp,
};

fn generator() -> BytecodeGenerator {
    BytecodeGenerator::new("test", AssemblerOptions::default())
}

#[test]
fn test_store_load_add_branch_return() {
    let mut builder = generator();
    let r0 = builder.new_register();
    let r1 = builder.new_register();
    let r2 = builder.new_register();
    let end = builder.new_label();

    builder.set_location(1, 1);
    builder.emit(Instr::StoreReg { reg: r0 });
    assert_eq!(builder.emit(Instr::LoadReg { reg: r0 }), None);
    builder.emit(Instr::Binary { op: BinaryOp::Add, lhs: r0, rhs: r1 });
    builder.set_location(2, 1);
    builder.emit(Instr::JumpFalse { target: end });
    builder.set_location(3, 1);
    builder.emit(Instr::StoreReg { reg: r2 });
    builder.define_label(end);
    builder.set_location(4, 1);
    builder.emit(Instr::Return);

    let func = builder.finish().expect("assembly failed");
    assert_eq!(func.instruction_count, 5);
    assert_eq!(func.code.len(), 10);

    let decoded = decode_function(&func.code).unwrap();
    let offsets: Vec<usize> = decoded.iter().map(|i| i.offset).collect();
    assert_eq!(offsets, vec![0, 2, 5, 7, 9]);
    assert_eq!(decoded[2].opcode, Opcode::JumpFalse);
    assert_eq!(decoded[2].operands, vec![2]);
    assert_eq!(decoded[2].jump_target(), Some(9));
    assert_eq!(decoded[4].opcode, Opcode::Ret);

    assert_eq!(func.line_table.len(), 4);
    let lines: Vec<(u32, u32)> = func.line_table.iter().map(|e| (e.offset, e.line)).collect();
    assert_eq!(lines, vec![(0, 1), (5, 2), (7, 3), (9, 4)]);
    assert_eq!(func.label_offset(end), Some(9));

    verify_function(&func).unwrap();
}

#[test]
fn test_immediate_width_boundaries() {
    for (value, wide) in [(127, false), (128, true), (-128, false), (-129, true)] {
        let mut builder = generator();
        builder.emit(Instr::LoadInt { value });
        let func = builder.finish().unwrap();

        let decoded = decode_function(&func.code).unwrap();
        assert_eq!(decoded[0].wide, wide, "width of {}", value);
        assert_eq!(decoded[0].operands, vec![value]);
        assert_eq!(func.code.len(), if wide { 5 } else { 2 });
    }
}

#[test]
fn test_one_wide_operand_widens_the_instruction() {
    let mut builder = generator();
    let base = builder.new_register();
    builder.emit(Instr::LoadProperty { base, name: NameRef(300) });
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let decoded = decode_function(&func.code).unwrap();
    assert!(decoded[0].wide);
    assert_eq!(decoded[0].operands, vec![0, 300]);
    assert_eq!(decoded[0].size, 9);
    assert_eq!(func.code[0], Opcode::LoadProperty.tag(true));
}

#[test]
fn test_instruction_offsets_are_prefix_sums() {
    let mut builder = generator();
    let regs: Vec<_> = (0..4).map(|_| builder.new_register()).collect();
    builder.emit(Instr::LoadConst { constant: ConstRef(1) });
    builder.emit(Instr::LoadConst { constant: ConstRef(70_000) });
    builder.emit(Instr::MoveReg { src: regs[0], dst: regs[3] });
    builder.emit(Instr::Compare { op: CompareOp::Lt, lhs: regs[1], rhs: regs[2] });
    builder.emit(Instr::LoadInt { value: -1_000_000 });
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let decoded = decode_function(&func.code).unwrap();
    assert_eq!(decoded.len(), func.instruction_count);
    let mut offset = 0;
    for instr in &decoded {
        assert_eq!(instr.offset, offset);
        offset += instr.size;
    }
    assert_eq!(offset, func.code.len());
}

#[test]
fn test_long_forward_jump_goes_wide() {
    let mut builder = generator();
    let regs: Vec<_> = (0..100).map(|_| builder.new_register()).collect();
    let end = builder.new_label();
    builder.emit(Instr::Jump { target: end });
    for &reg in &regs {
        builder.emit(Instr::StoreReg { reg });
    }
    builder.define_label(end);
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let decoded = decode_function(&func.code).unwrap();
    assert!(decoded[0].wide);
    let ret = decoded.last().unwrap();
    assert_eq!(ret.opcode, Opcode::Ret);
    assert_eq!(decoded[0].jump_target(), Some(ret.offset as i64));
    verify_function(&func).unwrap();
}

#[test]
fn test_loop_back_edge() {
    let mut builder = generator();
    let counter = builder.new_register();
    let limit = builder.new_register();
    let exit = builder.new_label();

    builder.emit(Instr::LoadZero);
    builder.emit(Instr::StoreReg { reg: counter });
    let head = builder.here();
    builder.emit(Instr::LoadReg { reg: counter });
    builder.emit(Instr::Compare { op: CompareOp::Lt, lhs: counter, rhs: limit });
    builder.emit(Instr::JumpFalse { target: exit });
    builder.emit(Instr::LoadReg { reg: counter });
    builder.emit(Instr::Unary { op: UnaryOp::Increment });
    builder.emit(Instr::StoreReg { reg: counter });
    builder.emit(Instr::Jump { target: head });
    builder.define_label(exit);
    builder.emit(Instr::LoadUndefined);
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let decoded = decode_function(&func.code).unwrap();
    // The load after the loop head survives because the label blocks fusion
    assert_eq!(decoded[2].opcode, Opcode::LoadReg);
    let back_edge = decoded.iter().find(|i| i.opcode == Opcode::Jump).unwrap();
    assert!(back_edge.operands[0] < 0);
    assert_eq!(back_edge.jump_target(), Some(func.label_offset(head).unwrap() as i64));
    let exit_jump = decoded.iter().find(|i| i.opcode == Opcode::JumpFalse).unwrap();
    assert_eq!(exit_jump.jump_target(), Some(func.label_offset(exit).unwrap() as i64));
    verify_function(&func).unwrap();
}

#[test]
fn test_many_jumps_to_one_label() {
    let mut builder = generator();
    let regs: Vec<_> = (0..60).map(|_| builder.new_register()).collect();
    let end = builder.new_label();
    for chunk in regs.chunks(3) {
        builder.emit(Instr::JumpTrue { target: end });
        for &reg in chunk {
            builder.emit(Instr::StoreReg { reg });
        }
    }
    builder.define_label(end);
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let target = func.label_offset(end).unwrap() as i64;
    let decoded = decode_function(&func.code).unwrap();
    let jumps: Vec<_> = decoded.iter().filter(|i| i.opcode == Opcode::JumpTrue).collect();
    assert_eq!(jumps.len(), 20);
    assert!(jumps.iter().all(|j| j.jump_target() == Some(target)));
    assert!(jumps.iter().any(|j| j.wide));
    assert!(jumps.iter().any(|j| !j.wide));
    verify_function(&func).unwrap();
}

#[test]
fn test_line_table_is_coalesced_and_increasing() {
    let mut builder = generator();
    let r0 = builder.new_register();
    for line in [1, 1, 2, 2, 2, 5, 3, 3] {
        builder.set_location(line, 1);
        builder.emit(Instr::LoadReg { reg: r0 });
    }
    builder.begin_statement();
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let lines: Vec<u32> = func.line_table.iter().map(|e| e.line).collect();
    assert_eq!(lines, vec![1, 2, 5, 3, 3]);
    assert!(func.line_table.windows(2).all(|w| w[0].offset < w[1].offset));
    assert_eq!(func.line_table.last().unwrap().statement, 1);
    assert_eq!(func.lookup_line(3).map(|e| e.line), Some(1));
}

#[test]
fn test_debug_mode_markers() {
    let options = AssemblerOptions::new().with_debug_mode(true);
    let mut builder = BytecodeGenerator::new("debug", options);
    let r0 = builder.new_register();
    builder.set_location(10, 1);
    builder.emit(Instr::LoadTrue);
    builder.emit(Instr::StoreReg { reg: r0 });
    builder.set_location(11, 1);
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let decoded = decode_function(&func.code).unwrap();
    let shape: Vec<(Opcode, Vec<i32>)> = decoded.into_iter().map(|i| (i.opcode, i.operands)).collect();
    assert_eq!(
        shape,
        vec![
            (Opcode::Debug, vec![10, 0]),
            (Opcode::LoadTrue, vec![]),
            (Opcode::StoreReg, vec![0]),
            (Opcode::Debug, vec![11, 1]),
            (Opcode::Ret, vec![]),
        ]
    );
    verify_function(&func).unwrap();
}

#[test]
fn test_source_locations_follow_layout() {
    let options = AssemblerOptions::new().with_source_locations(true);
    let mut builder = BytecodeGenerator::new("locations", options);
    let end = builder.new_label();
    builder.set_location(1, 5);
    builder.emit(Instr::LoadName { name: NameRef(1000) });
    builder.set_location(1, 9);
    builder.emit(Instr::JumpTrue { target: end });
    builder.set_location(2, 3);
    builder.emit(Instr::LoadNull);
    builder.define_label(end);
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let decoded = decode_function(&func.code).unwrap();
    let table = func.source_locations.as_ref().unwrap();
    assert_eq!(table.len(), decoded.len());
    for (entry, instr) in table.iter().zip(&decoded) {
        assert_eq!(entry.offset as usize, instr.offset);
    }
    assert_eq!(func.source_location(5).map(|e| e.column), Some(9));
    verify_function(&func).unwrap();
}

#[test]
fn test_exception_handler_offsets() {
    let mut builder = generator();
    let value = builder.new_register();
    let handler = builder.new_label();
    let done = builder.new_label();

    builder.set_unwind_handler(Some(handler));
    builder.emit(Instr::LoadName { name: NameRef(0) });
    builder.emit(Instr::ThrowException);
    builder.define_label(handler);
    builder.set_unwind_handler(None);
    builder.emit(Instr::GetException);
    builder.emit(Instr::StoreReg { reg: value });
    builder.emit(Instr::LoadUndefined);
    builder.emit(Instr::SetException);
    builder.emit(Instr::JumpNoException { target: done });
    builder.emit(Instr::UnwindDispatch);
    builder.define_label(done);
    builder.emit(Instr::LoadReg { reg: value });
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let decoded = decode_function(&func.code).unwrap();
    let set = &decoded[0];
    assert_eq!(set.opcode, Opcode::SetUnwindHandler);
    assert_eq!(set.jump_target(), Some(i64::from(func.label_offset(handler).unwrap())));
    assert_eq!(
        decoded.iter().find(|i| i.offset == func.label_offset(handler).unwrap() as usize).map(|i| i.opcode),
        Some(Opcode::ClearUnwindHandler)
    );
    verify_function(&func).unwrap();
}

#[test]
fn test_calls_and_frame_info() {
    let mut builder = generator();
    let func_reg = builder.new_register();
    let argv = builder.new_register_block(2);
    builder.set_frame_info(3, 0);
    builder.emit(Instr::LoadLocal { index: 2 });
    builder.emit(Instr::StoreReg { reg: argv });
    builder.emit(Instr::LoadScopedLocal { index: 0, scope: 1 });
    builder.emit(Instr::CallValue { func: func_reg, argc: 2, argv });
    builder.emit(Instr::CallProperty { base: func_reg, name: NameRef(4), argc: 1, argv });
    builder.emit(Instr::Construct { func: func_reg, argc: 0, argv });
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    assert_eq!(func.register_count, 3);
    assert_eq!(func.local_count, 3);
    assert_eq!(func.max_call_args, 2);
    verify_function(&func).unwrap();
}

#[test]
fn test_enclosing_scope_locals_verify() {
    let mut builder = generator();
    builder.set_frame_info(1, 0);
    builder.emit(Instr::LoadScopedLocal { index: 5, scope: 1 });
    builder.emit(Instr::StoreScopedLocal { index: 0, scope: 0 });
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    assert_eq!(verify_function(&func), Ok(()));
}

#[test]
#[should_panic(expected = "register space exhausted")]
fn test_register_exhaustion_panics() {
    let mut builder = generator();
    builder.new_register();
    builder.new_register_block(u32::MAX);
}

#[test]
fn test_disassembly_listing() {
    let mut builder = generator();
    let r0 = builder.new_register();
    let end = builder.new_label();
    builder.emit(Instr::StoreReg { reg: r0 });
    builder.emit(Instr::JumpFalse { target: end });
    builder.emit(Instr::LoadInt { value: 500 });
    builder.define_label(end);
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let text = disassemble(&func.code).unwrap();
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    assert_eq!(
        lines,
        vec!["0: STORE_REG 0", "2: JUMP_FALSE +5 -> 9", "4: LOAD_INT.w 500", "9: RET"]
    );
}

#[test]
fn test_compiled_function_serializes() {
    let options = AssemblerOptions::new().with_source_locations(true);
    let mut builder = BytecodeGenerator::new("serde", options);
    let label = builder.new_label();
    builder.set_location(1, 1);
    builder.emit(Instr::JumpTrue { target: label });
    builder.emit(Instr::StoreName { name: NameRef(2) });
    builder.define_label(label);
    builder.emit(Instr::Return);
    let func = builder.finish().unwrap();

    let json = serde_json::to_string(&func).unwrap();
    let back: CompiledFunction = serde_json::from_str(&json).unwrap();
    assert_eq!(back, func);
}

#[test]
#[should_panic(expected = "resolved twice")]
fn test_label_defined_twice_panics() {
    let mut builder = generator();
    let label = builder.new_label();
    builder.define_label(label);
    builder.emit(Instr::Nop);
    builder.define_label(label);
}

#[test]
#[should_panic(expected = "never resolved")]
fn test_jump_to_unresolved_label_panics() {
    let mut builder = generator();
    let label = builder.new_label();
    builder.emit(Instr::Jump { target: label });
    let _ = builder.finish();
}
