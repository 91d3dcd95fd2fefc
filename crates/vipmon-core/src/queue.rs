//! 용량 제한 FIFO 큐.
//!
//! 가득 차면 가장 오래된 항목부터 버린다 (새 항목 거부 아님).
//! 전송 실패 배치는 앞쪽에 재삽입되어 다음 flush에서 먼저 전송된다.

use std::collections::VecDeque;

/// 용량 제한 FIFO 큐
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    /// 재삽입 시 허용하는 최대 배치 크기
    retry_cap: usize,
}

impl<T> BoundedQueue<T> {
    /// 새 큐 생성 (재삽입 상한 = 용량)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            retry_cap: capacity,
        }
    }

    /// 재삽입 상한 설정
    pub fn with_retry_cap(mut self, retry_cap: usize) -> Self {
        self.retry_cap = retry_cap;
        self
    }

    /// 뒤에 추가. 용량 초과 시 앞(가장 오래된)부터 제거하고 제거 수를 반환
    pub fn append(&mut self, item: T) -> usize {
        self.items.push_back(item);
        let mut evicted = 0;
        while self.items.len() > self.capacity {
            self.items.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// 전체 내용을 꺼내고 비움
    pub fn drain_all(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    /// 실패한 배치를 앞쪽에 재삽입 (원래 순서 유지)
    ///
    /// 배치는 `retry_cap`까지만(오래된 것 우선) 유지하고,
    /// 합친 결과가 용량을 넘으면 뒤(가장 최근)부터 잘라낸다.
    /// 잘려 나간 항목 수를 반환.
    pub fn requeue_front(&mut self, mut records: Vec<T>) -> usize {
        let mut dropped = 0;
        if records.len() > self.retry_cap {
            dropped += records.len() - self.retry_cap;
            records.truncate(self.retry_cap);
        }

        for record in records.into_iter().rev() {
            self.items.push_front(record);
        }

        if self.items.len() > self.capacity {
            dropped += self.items.len() - self.capacity;
            self.items.truncate(self.capacity);
        }
        dropped
    }

    /// 복원된 레코드를 순서대로 추가 (append 규칙 적용). 제거 수 반환
    pub fn extend_restored(&mut self, records: Vec<T>) -> usize {
        records.into_iter().map(|r| self.append(r)).sum()
    }

    /// 현재 항목 수
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 비어있는지
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 앞에서부터 순회
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// 현재 내용 복제본 (내구성 미러 기록용)
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(queue: &BoundedQueue<&'static str>) -> Vec<&'static str> {
        queue.iter().copied().collect()
    }

    #[test]
    fn drop_oldest_on_overflow() {
        let mut queue = BoundedQueue::new(3);
        for item in ["A", "B", "C"] {
            assert_eq!(queue.append(item), 0);
        }
        assert_eq!(queue.append("D"), 1);
        assert_eq!(contents(&queue), vec!["B", "C", "D"]);
    }

    #[test]
    fn overflow_keeps_most_recent_in_order() {
        let mut queue = BoundedQueue::new(5);
        for i in 0..20 {
            queue.append(i);
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.snapshot(), vec![15, 16, 17, 18, 19]);
    }

    #[test]
    fn drain_all_empties_queue() {
        let mut queue = BoundedQueue::new(4);
        queue.append("A");
        queue.append("B");
        assert_eq!(queue.drain_all(), vec!["A", "B"]);
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn requeue_goes_ahead_of_newer_records() {
        let mut queue = BoundedQueue::new(10);
        queue.append("A");
        queue.append("B");
        let batch = queue.drain_all();
        queue.append("C");

        assert_eq!(queue.requeue_front(batch), 0);
        assert_eq!(contents(&queue), vec!["A", "B", "C"]);
    }

    #[test]
    fn requeue_truncates_newest_when_over_capacity() {
        let mut queue = BoundedQueue::new(3);
        queue.append("A");
        queue.append("B");
        let batch = queue.drain_all();
        queue.append("C");
        queue.append("D");

        assert_eq!(queue.requeue_front(batch), 1);
        assert_eq!(contents(&queue), vec!["A", "B", "C"]);
    }

    #[test]
    fn requeue_respects_retry_cap() {
        let mut queue = BoundedQueue::new(10).with_retry_cap(2);
        let dropped = queue.requeue_front(vec!["A", "B", "C"]);
        assert_eq!(dropped, 1);
        assert_eq!(contents(&queue), vec!["A", "B"]);
    }

    #[test]
    fn extend_restored_applies_capacity() {
        let mut queue = BoundedQueue::new(2);
        queue.append("A");
        assert_eq!(queue.extend_restored(vec!["B", "C"]), 1);
        assert_eq!(contents(&queue), vec!["B", "C"]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut queue = BoundedQueue::new(0);
        queue.append("A");
        queue.append("B");
        assert_eq!(queue.capacity(), 1);
        assert_eq!(contents(&queue), vec!["B"]);
    }
}
