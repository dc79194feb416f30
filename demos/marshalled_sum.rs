use threading_core::marshal::{
	demarshal_block_from_thread, demarshal_int, marshal_block_to_thread, marshal_int,
	MarshalledBlock,
};
use threading_core::{create_with, wait_for, ThreadHandle};

const N: usize = 8;

fn main() {
	let numbers: [u8; N] = [3, 1, 4, 1, 5, 9, 2, 6];
	let mut slots: Vec<Option<ThreadHandle<_>>> = Vec::with_capacity(N);

	for chunk in numbers.chunks(2) {
		let block = marshal_block_to_thread(chunk).unwrap();
		let handle = create_with(
			|block: MarshalledBlock| {
				let len = block.len();
				let mut local = [0; 2];
				demarshal_block_from_thread(&mut local, block, len).unwrap();
				marshal_int(local.iter().map(|&n| i32::from(n)).sum()).unwrap()
			},
			block,
		)
		.unwrap();
		slots.push(Some(handle));
	}

	let total: i32 = slots
		.iter_mut()
		.map(|slot| demarshal_int(wait_for(slot).unwrap().returned().unwrap()))
		.sum();

	println!("{total}");
}
