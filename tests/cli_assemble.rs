use assert_cmd::Command;
use oog::libs::psl::Psl;
use predicates::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn genome(len: usize) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(42);
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

// AC1 and AC2 overlap by 200 bases on the first barge, AC3 sits on the second
fn write_contig(dir: &Path) -> anyhow::Result<Vec<u8>> {
    let genome = genome(6000);
    fs::write(dir.join("info.mm"), "ctg7 PLACED\nAC1 0 1 0\nAC2 1 1 0\nAC3 5 1 0\n")?;
    let mut list = String::new();
    for (acc, s, e) in [("AC1", 0, 1200), ("AC2", 1000, 2200), ("AC3", 5000, 6000)] {
        let seq = String::from_utf8(genome[s..e].to_vec())?;
        fs::write(dir.join(format!("{}.fa", acc)), format!(">{}_1\n{}\n", acc, seq))?;
        list += &format!("{}.fa\n", acc);
    }
    fs::write(dir.join("geno.lst"), list)?;
    fs::write(dir.join("mmEnds"), "+(AC1 +(AC2 AC1) AC2)\n+(AC3 AC3)\n")?;

    let mut psl = vec![];
    Psl::ungapped("AC1_1", 1200, 1000, "AC2_1", 1200, 0, 200, "+").write_to(&mut psl)?;
    fs::write(dir.join("self.psl"), psl)?;
    Ok(genome)
}

#[test]
fn command_assemble() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let genome = write_contig(temp.path())?;
    let out = temp.path().join("out");

    let mut cmd = Command::cargo_bin("oog")?;
    cmd.arg("assemble")
        .arg(temp.path())
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("golden path\t103200 bases"))
        .stderr(predicate::str::contains("rafts\t2 (2 frags rafted)"));

    let gold = fs::read_to_string(out.join("gold"))?;
    assert_eq!(gold.lines().count(), 4);
    assert!(gold.lines().all(|l| l.starts_with("ctg7\t")));
    assert!(gold.contains("\tN\t100000\tclone\tno\n"));
    assert!(gold.ends_with("\tO\tAC3_1\t1\t1000\t+\n"));

    let fa = fs::read_to_string(out.join("ctg7.fa"))?;
    let mut lines = fa.lines();
    assert_eq!(lines.next(), Some(">ctg7"));
    assert!(lines.clone().all(|l| l.len() <= 50));
    let seq: String = lines.collect();
    assert_eq!(seq.len(), 103200);
    assert!(seq.ends_with(std::str::from_utf8(&genome[5000..6000])?));

    for name in ["gl", "ooGreedy.gl", "raft", "barge", "graph", "graph.json", "raft.psl", "fragMap", "raftOrder", "oog.log"] {
        assert!(out.join(name).is_file(), "{}", name);
    }
    let barge = fs::read_to_string(out.join("barge"))?;
    assert!(barge.contains("----- open gap -----"));

    Ok(())
}

#[test]
fn command_assemble_in_place() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    write_contig(temp.path())?;

    let mut cmd = Command::cargo_bin("oog")?;
    cmd.arg("assemble").arg(temp.path()).assert().success();
    assert!(temp.path().join("gold").is_file());

    let order = fs::read_to_string(temp.path().join("raftOrder"))?;
    assert_eq!(order.lines().count(), 2);

    Ok(())
}

#[test]
fn command_assemble_chain() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    write_contig(temp.path())?;
    fs::write(temp.path().join("fragChains"), "AC2_1 + AC3_1 1000 5000 50\n")?;

    let mut cmd = Command::cargo_bin("oog")?;
    cmd.arg("assemble")
        .arg(temp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("lines\t1 (1 ok, 0 conflicted)"));

    let gold = fs::read_to_string(temp.path().join("gold"))?;
    assert!(gold.contains("\tN\t50000\tclone\tyes\n"));
    let barge = fs::read_to_string(temp.path().join("barge"))?;
    assert!(barge.contains("----- bridged gap -----"));
    let log = fs::read_to_string(temp.path().join("oog.log"))?;
    assert!(log.contains("accept\tchain"));

    Ok(())
}

#[test]
fn command_assemble_config() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    write_contig(temp.path())?;
    let params = temp.path().join("params.json");
    fs::write(&params, r#"{"unbridged_barge_gap": 5000}"#)?;

    let mut cmd = Command::cargo_bin("oog")?;
    cmd.arg("assemble")
        .arg(temp.path())
        .arg("--config")
        .arg(&params)
        .assert()
        .success();

    let gold = fs::read_to_string(temp.path().join("gold"))?;
    assert!(gold.contains("\tN\t5000\tclone\tno\n"));

    Ok(())
}

#[test]
fn command_assemble_bad_config() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    write_contig(temp.path())?;
    let params = temp.path().join("params.json");
    fs::write(&params, r#"{"max_tail_size": -1}"#)?;

    let mut cmd = Command::cargo_bin("oog")?;
    cmd.arg("assemble")
        .arg(temp.path())
        .arg("--config")
        .arg(&params)
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_tail_size must not be negative"));
    assert!(!temp.path().join("gold").exists());

    fs::write(&params, r#"{"end_pair_min": 500000}"#)?;
    let mut cmd = Command::cargo_bin("oog")?;
    cmd.arg("assemble")
        .arg(temp.path())
        .arg("--config")
        .arg(&params)
        .assert()
        .failure()
        .stderr(predicate::str::contains("end_pair_min exceeds end_pair_max"));

    // flags are checked after they override the file
    let mut cmd = Command::cargo_bin("oog")?;
    cmd.arg("assemble")
        .arg(temp.path())
        .arg("--max-tail-size=-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_tail_size must not be negative"));

    Ok(())
}

#[test]
fn command_dump_config() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("oog")?;
    let output = cmd
        .arg("assemble")
        .arg("--dump-config")
        .arg("--frag-gap")
        .arg("200")
        .arg("--min-score")
        .arg("-300")
        .output()?;
    assert!(output.status.success());

    let cfg: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(cfg["frag_gap"], 200);
    assert_eq!(cfg["min_score"], -300);
    assert_eq!(cfg["max_tail_size"], 2000);
    assert_eq!(cfg["scoring"]["big_block"], 20);

    Ok(())
}

#[test]
fn command_assemble_errors() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("oog")?;
    cmd.arg("assemble")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("info.mm not found"));

    write_contig(temp.path())?;
    fs::write(temp.path().join("mmEnds"), "+(AC1 +(AC5 AC1) AC5)\n")?;
    let mut cmd = Command::cargo_bin("oog")?;
    cmd.arg("assemble")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown clone AC5"));

    write_contig(temp.path())?;
    fs::write(temp.path().join("fragChains"), "AC2_1 + AC8_1 1000 5000 50\n")?;
    let mut cmd = Command::cargo_bin("oog")?;
    cmd.arg("assemble")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown fragment AC8_1"));

    Ok(())
}
