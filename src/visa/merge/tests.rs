use super::*;
use crate::visa::parser::parse_kernel;
use crate::visa::{DeclKind, Operand};

fn kernel(src: &str) -> Kernel {
    match parse_kernel(src) {
        Ok(k) => k,
        Err(errs) => panic!("{:?}", errs.iter().map(|e| &e.message).collect::<Vec<_>>()),
    }
}

#[test]
fn four_moves_become_one() {
    let mut k = kernel(
        "kernel k\n\
         decl V1 d 4\n\
         block BB0\n\
         mov (1) V1(0)<1>:d 0:d\n\
         mov (1) V1(4)<1>:d 0:d\n\
         mov (1) V1(8)<1>:d 0:d\n\
         mov (1) V1(12)<1>:d 0:d\n",
    );
    let report = merge_scalar(&mut k, &TargetConfig::skl());
    assert_eq!(report.merged_count(), 1);
    assert_eq!((report.insts_before, report.insts_after), (4, 1));
    assert_eq!(k.blocks[0].insts.len(), 1);
    insta::assert_snapshot!(
        k.blocks[0].insts[0].display(&k.decls).to_string(),
        @"mov (4) V1(0)<1>:d 0:d"
    );
    assert_eq!(report.modified, vec!["V1".to_string()]);
}

#[test]
fn merged_width_is_count_times_scalar_width() {
    let mut k = kernel(
        "kernel k\n\
         decl V1 w 8\n\
         decl V2 w 8\n\
         block BB0\n\
         add (1) V1(0)<1>:w V2(0)<1>:w 1:w\n\
         add (1) V1(2)<1>:w V2(2)<1>:w 1:w\n",
    );
    merge_scalar(&mut k, &TargetConfig::skl());
    let inst = &k.blocks[0].insts[0];
    assert_eq!(inst.exec_size, 2);
    let dst = inst.dst.as_region().unwrap();
    assert_eq!(dst.byte_len(inst.exec_size), 2 * 2);
}

#[test]
fn broadcast_source_and_rest_of_block_kept() {
    let mut k = kernel(
        "kernel k\n\
         decl V1 f 4\n\
         decl S f 1\n\
         block BB0\n\
         mul (1) V1(0)<1>:f V1(0)<1>:f S(0)<0>:f\n\
         mul (1) V1(4)<1>:f V1(4)<1>:f S(0)<0>:f\n\
         cmp.lt.f0 (1) V1(8)<1>:f S(0)<0>:f 0:f\n",
    );
    let report = merge_scalar(&mut k, &TargetConfig::skl());
    assert_eq!(report.merged.len(), 1);
    insta::assert_snapshot!(k.to_string(), @r"
    kernel k
    decl V1 f 4
    decl S f 1
    block BB0
      mul (2) V1(0)<1>:f V1(0)<1>:f S(0)<0>:f
      cmp.lt.f0 (1) V1(8)<1>:f S(0)<0>:f 0:f
    ");
}

#[test]
fn adjacent_inputs_leave_originals_dead() {
    let mut k = kernel(
        "kernel k\n\
         decl V1 d 2\n\
         input A d 1 at 64\n\
         input B d 1 at 68\n\
         block BB0\n\
         mov (1) V1(0)<1>:d A(0)<0>:d\n\
         mov (1) V1(4)<1>:d B(0)<0>:d\n",
    );
    let report = merge_scalar(&mut k, &TargetConfig::skl());
    assert_eq!(report.new_inputs.len(), 1);
    assert_eq!(report.dead_decls, vec!["A".to_string(), "B".to_string()]);
    let id = k.decls.find(&report.new_inputs[0]).unwrap();
    assert_eq!(k.decls.get(id).kind, DeclKind::Input { offset: 64 });
    match &k.blocks[0].insts[0].srcs[0] {
        Operand::Region(r) => assert_eq!((r.decl, r.offset, r.stride), (id, 0, 1)),
        other => panic!("unexpected operand {:?}", other),
    }
}

#[test]
fn capacity_rejection_resumes_after_bundle() {
    // The first run straddles a GRF boundary from an unaligned start; the
    // second run is aligned and still merges.
    let mut k = kernel(
        "kernel k\n\
         decl V1 d 16\n\
         decl V2 d 2\n\
         block BB0\n\
         mov (1) V1(24)<1>:d 0:d\n\
         mov (1) V1(28)<1>:d 0:d\n\
         mov (1) V1(32)<1>:d 0:d\n\
         mov (1) V1(36)<1>:d 0:d\n\
         add (1) V2(0)<1>:d V1(0)<0>:d 1:d\n\
         add (1) V2(4)<1>:d V1(0)<0>:d 1:d\n",
    );
    let report = merge_scalar(&mut k, &TargetConfig::skl());
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].start, 0);
    assert_eq!(report.rejected[0].width, 4);
    assert!(report.rejected[0].reason.contains("GRF boundary"));
    assert_eq!(report.merged.len(), 1);
    assert_eq!(report.merged[0].start, 4);
    assert_eq!(report.merged[0].opcode, Opcode::Add);
    assert_eq!(k.blocks[0].insts.len(), 5);
}

#[test]
fn later_positions_are_reported_in_input_coordinates() {
    let mut k = kernel(
        "kernel k\n\
         decl V1 d 8\n\
         block BB0\n\
         mov (1) V1(0)<1>:d 0:d\n\
         mov (1) V1(4)<1>:d 0:d\n\
         not (1) V1(16)<1>:d V1(0)<0>:d\n\
         mov (1) V1(8)<1>:d 1:d\n\
         mov (1) V1(12)<1>:d 1:d\n",
    );
    let report = merge_scalar(&mut k, &TargetConfig::skl());
    let starts: Vec<usize> = report.merged.iter().map(|m| m.start).collect();
    assert_eq!(starts, vec![0, 3]);
    assert_eq!(k.blocks[0].insts.len(), 3);
}

#[test]
fn simd_flow_block_needs_nomask() {
    let mut k = kernel(
        "kernel k\n\
         decl V1 d 4\n\
         block BB0 simd_cf\n\
         mov (1) V1(0)<1>:d 0:d\n\
         mov (1) V1(4)<1>:d 0:d\n\
         mov (1, nomask) V1(8)<1>:d 0:d\n\
         mov (1, nomask) V1(12)<1>:d 0:d\n",
    );
    let report = merge_scalar(&mut k, &TargetConfig::skl());
    assert_eq!(report.merged.len(), 1);
    assert_eq!(report.merged[0].start, 2);
    assert_eq!(k.blocks[0].insts.len(), 3);
}

#[test]
fn disabled_target_leaves_kernel_alone() {
    let src = "kernel k\n\
               decl V1 d 2\n\
               block BB0\n\
               mov (1) V1(0)<1>:d 0:d\n\
               mov (1) V1(4)<1>:d 0:d\n";
    let mut k = kernel(src);
    let target = TargetConfig {
        merge_enabled: false,
        ..TargetConfig::skl()
    };
    let report = merge_scalar(&mut k, &target);
    assert!(report.merged.is_empty());
    assert_eq!(report.insts_after, 2);
    assert_eq!(k.blocks[0].insts.len(), 2);
}

#[test]
fn report_serializes_to_json() {
    let mut k = kernel(
        "kernel k\n\
         decl V1 d 2\n\
         block BB0\n\
         mov (1) V1(0)<1>:d 0:d\n\
         mov (1) V1(4)<1>:d 0:d\n",
    );
    let report = merge_scalar(&mut k, &TargetConfig::skl());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["kernel"], "k");
    assert_eq!(json["merged"][0]["opcode"], "mov");
    assert_eq!(json["merged"][0]["width"], 2);
    assert_eq!(json["insts_after"], 1);
}

#[test]
fn same_packed_inputs_reuse_one_declaration() {
    let mut k = kernel(
        "kernel k\n\
         decl V1 d 2\n\
         decl V2 d 2\n\
         input A d 1 at 64\n\
         input B d 1 at 68\n\
         block BB0\n\
         mov (1) V1(0)<1>:d A(0)<0>:d\n\
         mov (1) V1(4)<1>:d B(0)<0>:d\n\
         add (1) V2(0)<1>:d A(0)<0>:d 1:d\n\
         add (1) V2(4)<1>:d B(0)<0>:d 1:d\n",
    );
    let report = merge_scalar(&mut k, &TargetConfig::skl());
    assert_eq!(report.merged_count(), 2);
    assert_eq!(report.new_inputs.len(), 1);
    let id = k.decls.find(&report.new_inputs[0]).unwrap();
    let src_decls: Vec<_> = k.blocks[0]
        .insts
        .iter()
        .map(|inst| inst.srcs[0].as_region().map(|r| r.decl))
        .collect();
    assert_eq!(src_decls, vec![Some(id), Some(id)]);
    assert_eq!(k.decls.len(), 5);
}

#[test]
fn invalid_target_skips_the_pass() {
    let mut k = kernel(
        "kernel k\n\
         decl V1 d 2\n\
         block BB0\n\
         mov (1) V1(0)<1>:d 0:d\n\
         mov (1) V1(4)<1>:d 0:d\n",
    );
    let target = TargetConfig {
        grf_size: 0,
        ..TargetConfig::skl()
    };
    let report = merge_scalar(&mut k, &target);
    assert!(report.merged.is_empty() && report.rejected.is_empty());
    assert_eq!(k.blocks[0].insts.len(), 2);
}
