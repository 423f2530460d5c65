use std::time::Instant;

use nap::{block_on, sleep, spawn};

fn main() {
    let start = Instant::now();
    block_on(async {
        let slow = spawn(async move {
            sleep(50).await;
            println!("50ms delay resumed at {:?}", start.elapsed());
        });
        let fast = spawn(async move {
            sleep(10).await;
            println!("10ms delay resumed at {:?}", start.elapsed());
        });
        fast.await;
        slow.await;
    });
}
