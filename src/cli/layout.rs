use genlower::wi::layout::{FIELDS, TOTAL_SIZE};

pub fn cmd_layout() {
    println!("{:>6}  {:>4}  field", "offset", "size");
    for field in FIELDS {
        println!("{:>6}  {:>4}  {}", field.offset, field.size, field.name);
    }
    println!("{:>6}  {:>4}  (total)", TOTAL_SIZE, "");
}
